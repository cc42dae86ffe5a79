//! Serialized report types for outfit-cli.

use outfit_core::PipelineReport;
use serde::Serialize;

/// Everything reported for a single input image.
#[derive(Debug, Serialize)]
pub struct ImageReport {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<PipelineReport>,
    /// Crop files written, in the order of `report.crops`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub crop_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageReport {
    pub fn failed(image: String, error: &anyhow::Error) -> Self {
        Self {
            image,
            report: None,
            crop_files: Vec::new(),
            error: Some(format!("{error:#}")),
        }
    }
}
