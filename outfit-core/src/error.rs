use thiserror::Error;

/// Failures that abort processing of a single image.
///
/// Semantic misses and quality rejections never surface here; they are
/// reported inside the pipeline result.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The external detector failed or timed out.
    #[error("detector call failed on attempt {attempt}")]
    Detector {
        attempt: u32,
        #[source]
        source: anyhow::Error,
    },
    /// The image has no pixels to detect or crop from.
    #[error("image has invalid dimensions {width}x{height}")]
    InvalidImage { width: u32, height: u32 },
}
