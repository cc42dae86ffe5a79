//! Shared configuration types consumed across the outfit workspace.
//!
//! These structures hold the tunable knobs of the reconciliation pipeline
//! (suppression, matching, retry budget, quality gate) in a form that can be
//! serialized to disk and reused by the CLI and by batch drivers. The numeric
//! defaults were tuned empirically and are exposed here so they can be
//! revisited without touching the engine.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Parameters for the detect / suppress / retry loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionSettings {
    /// IoU above which a lower-priority detection is suppressed.
    pub iou_threshold: f32,
    /// Minimum Jaccard score for a label to satisfy an expected item.
    pub similarity_threshold: f32,
    /// Total number of detector calls allowed for one image.
    pub max_retry_attempts: u32,
    /// Phrases prepended to the first prompt only.
    pub prompt_prefixes: Vec<String>,
    /// Separator placed between labels in a detector prompt.
    pub prompt_separator: String,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            iou_threshold: 0.5,
            similarity_threshold: 0.15,
            max_retry_attempts: 2,
            prompt_prefixes: Vec::new(),
            prompt_separator: " . ".to_string(),
        }
    }
}

/// Scoring adjustments used when reconciling detections against expected items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconcileSettings {
    /// Additive bonus for garment-labelled detections when there are too many.
    pub garment_bonus: f32,
    /// Multiplier applied to detail-only labels when there are too many.
    pub detail_penalty: f32,
    /// Similarity recorded on synthesized fallback pairs.
    pub fallback_similarity: f32,
    /// Allow small accessories to borrow a related detection's box.
    pub enable_fallback: bool,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            garment_bonus: 0.5,
            detail_penalty: 0.3,
            fallback_similarity: 0.1,
            enable_fallback: true,
        }
    }
}

/// Encoded output format for exported crops.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl OutputFormat {
    /// File extension used for this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Webp => "webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Webp => "webp",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "webp" => Ok(OutputFormat::Webp),
            other => Err(format!(
                "invalid output format '{other}'; expected 'png', 'jpeg' or 'webp'"
            )),
        }
    }
}

/// Crop geometry and quality-gate thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CropSettings {
    /// Fraction of the box width/height added on each side before cropping.
    pub margin_pct: f32,
    /// Minimum crop area as a fraction of the image area.
    pub min_crop_ratio: f32,
    /// Minimum detector confidence for a crop to be accepted.
    pub min_confidence: f32,
    /// How far above `min_confidence` a small crop must score to be rescued.
    pub rescue_confidence_margin: f32,
    /// Fraction of the crop width/height added on each side when rescuing.
    pub rescue_expand_pct: f32,
    /// Prefer a mask-derived box when a mask refiner is available.
    pub use_mask_refinement: bool,
    /// Encoding used for exported crop files.
    pub output_format: OutputFormat,
    /// JPEG quality (1-100, only used when format is jpeg).
    pub jpeg_quality: u8,
}

impl Default for CropSettings {
    fn default() -> Self {
        Self {
            margin_pct: 0.05,
            min_crop_ratio: 0.003,
            min_confidence: 0.3,
            rescue_confidence_margin: 0.1,
            rescue_expand_pct: 0.10,
            use_mask_refinement: true,
            output_format: OutputFormat::Png,
            jpeg_quality: 90,
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }
}

/// Persistent settings consumed by the CLI and batch drivers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub detection: DetectionSettings,
    pub reconcile: ReconcileSettings,
    pub crop: CropSettings,
    pub telemetry: TelemetrySettings,
}

impl AppSettings {
    /// Load settings from a JSON file.
    ///
    /// Missing sections fall back to their defaults; out-of-range values are
    /// clamped by [`AppSettings::sanitize`].
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;
        settings.sanitize();
        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }

    /// Clamp values to sensible ranges.
    pub fn sanitize(&mut self) {
        let detection = &mut self.detection;
        detection.iou_threshold = clamp_unit(detection.iou_threshold);
        detection.similarity_threshold = clamp_unit(detection.similarity_threshold);
        detection.max_retry_attempts = detection.max_retry_attempts.max(1);
        if detection.prompt_separator.is_empty() {
            detection.prompt_separator = DetectionSettings::default().prompt_separator;
        }

        let reconcile = &mut self.reconcile;
        reconcile.garment_bonus = reconcile.garment_bonus.max(0.0);
        reconcile.detail_penalty = clamp_unit(reconcile.detail_penalty);
        reconcile.fallback_similarity = clamp_unit(reconcile.fallback_similarity);

        let crop = &mut self.crop;
        crop.margin_pct = clamp_unit(crop.margin_pct);
        crop.min_crop_ratio = clamp_unit(crop.min_crop_ratio);
        crop.min_confidence = clamp_unit(crop.min_confidence);
        crop.rescue_confidence_margin = clamp_unit(crop.rescue_confidence_margin);
        crop.rescue_expand_pct = clamp_unit(crop.rescue_expand_pct);
        crop.jpeg_quality = crop.jpeg_quality.clamp(1, 100);
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Returns the default path for persisted settings (`config/outfit_settings.json`).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/outfit_settings.json"))
        .unwrap_or_else(|_| PathBuf::from("config/outfit_settings.json"))
}
