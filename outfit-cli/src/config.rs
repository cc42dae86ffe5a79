//! Configuration loading and CLI override logic.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;
use outfit_utils::{
    config::{AppSettings, default_settings_path},
    normalize_path,
};

use crate::args::CropArgs;

/// Load application settings from a file or use defaults.
pub fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        let settings = AppSettings::load_from_path(&resolved)?;
        info!("Loaded settings from {}", resolved.display());
        Ok(settings)
    } else {
        let default_path = default_settings_path();
        if default_path.exists() {
            let settings = AppSettings::load_from_path(&default_path).with_context(|| {
                format!(
                    "failed to load default settings from {}",
                    default_path.display()
                )
            })?;
            info!("Loaded settings from {}", default_path.display());
            Ok(settings)
        } else {
            Ok(AppSettings::default())
        }
    }
}

/// Apply command-line arguments to override loaded or default settings.
pub fn apply_cli_overrides(settings: &mut AppSettings, args: &CropArgs) {
    if args.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = args.telemetry_level.as_ref() {
        let normalized = level.trim();
        if !normalized.is_empty() {
            let lower = normalized.to_ascii_lowercase();
            settings.telemetry.level = lower.clone();
            if lower == "off" {
                settings.telemetry.enabled = false;
            }
        }
    }

    if let Some(iou) = args.iou_threshold {
        settings.detection.iou_threshold = iou;
    }
    if let Some(similarity) = args.similarity_threshold {
        settings.detection.similarity_threshold = similarity;
    }
    if let Some(max) = args.max_retries {
        settings.detection.max_retry_attempts = max;
    }
    if args.no_fallback {
        settings.reconcile.enable_fallback = false;
    }

    if let Some(margin) = args.margin_pct {
        settings.crop.margin_pct = margin;
    }
    if let Some(ratio) = args.min_crop_ratio {
        settings.crop.min_crop_ratio = ratio;
    }
    if let Some(confidence) = args.min_confidence {
        settings.crop.min_confidence = confidence;
    }
    if let Some(format) = args.format {
        settings.crop.output_format = format;
    }
    if let Some(quality) = args.jpeg_quality {
        settings.crop.jpeg_quality = quality;
    }

    settings.sanitize();
}
