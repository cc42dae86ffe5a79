//! Command-line argument definitions for outfit-cli.

use clap::{ArgAction, Parser};
use outfit_utils::OutputFormat;
use std::path::PathBuf;

/// Locate, validate and crop expected clothing items using recorded detector output.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct CropArgs {
    /// Path to an image file or a directory containing images.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Comma-separated expected item labels, applied to every image.
    #[arg(long, conflicts_with = "items_file")]
    pub items: Option<String>,

    /// Describer JSON (`[{"label": ..., "description": ...}]`) applied to every image.
    ///
    /// Without `--items` or `--items-file`, each image uses its `<stem>.items.json` sidecar.
    #[arg(long)]
    pub items_file: Option<PathBuf>,

    /// Recorded detector responses for a single input image.
    ///
    /// Defaults to the `<stem>.detections.json` sidecar next to each image.
    #[arg(short, long)]
    pub detections: Option<PathBuf>,

    /// Directory to write accepted crops into. Crops are not written when omitted.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Write the JSON report to a file instead of stdout.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Optional settings JSON. Defaults to `config/outfit_settings.json` when present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, action = ArgAction::SetTrue)]
    pub telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub telemetry_level: Option<String>,

    /// Override the IoU above which duplicate boxes are suppressed.
    #[arg(long)]
    pub iou_threshold: Option<f32>,

    /// Override the minimum label/phrase similarity for a match.
    #[arg(long)]
    pub similarity_threshold: Option<f32>,

    /// Override the total number of detector calls per image.
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Disable borrowing related boxes for missing small accessories.
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_fallback: bool,

    /// Override the margin added on each side of a crop (fraction of box size).
    #[arg(long)]
    pub margin_pct: Option<f32>,

    /// Override the minimum crop area as a fraction of the image area.
    #[arg(long)]
    pub min_crop_ratio: Option<f32>,

    /// Override the minimum detector confidence for a crop.
    #[arg(long)]
    pub min_confidence: Option<f32>,

    /// Crop file format: png, jpeg or webp.
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// JPEG quality (1-100) when `--format jpeg` is used.
    #[arg(long)]
    pub jpeg_quality: Option<u8>,
}
