//! Common helpers shared across outfit crates.

/// Persisted pipeline settings.
pub mod config;
/// Test fixture loading and path resolution.
pub mod fixtures;
/// Crop export (encoding and file naming).
pub mod output;
/// Instrumentation helpers for optional stage timing.
pub mod telemetry;

use std::path::Path;

use anyhow::Result;
use log::LevelFilter;

pub use config::{
    AppSettings, CropSettings, DetectionSettings, OutputFormat, ReconcileSettings,
    TelemetrySettings,
};
pub use fixtures::{fixture_path, fixtures_dir, load_fixture_json, load_json};
pub use output::{ExportOptions, crop_file_name, save_crop};
pub use telemetry::{
    StageTimer, configure as configure_telemetry, stage_timer, telemetry_allows,
    telemetry_enabled,
};

/// Initialize logging once for CLI and batch environments.
///
/// `RUST_LOG` takes precedence; otherwise `default_filter` is used. Telemetry
/// lines are always let through so that `--telemetry` works without also
/// raising the global level.
///
/// # Arguments
///
/// * `default_filter` - The `LevelFilter` to use if `RUST_LOG` is not set.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module(telemetry::TELEMETRY_TARGET, LevelFilter::Trace);

    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
///
/// # Arguments
///
/// * `path` - The path to validate and normalize.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<std::path::PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    Ok(path.canonicalize()?)
}
