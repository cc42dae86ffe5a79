//! Input collection and sidecar resolution.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use outfit_core::{DetectionScript, ExpectedItem};
use outfit_utils::load_json;
use walkdir::WalkDir;

use crate::args::CropArgs;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];
const DETECTIONS_SUFFIX: &str = "detections.json";
const ITEMS_SUFFIX: &str = "items.json";

/// One image together with the inputs needed to process it.
#[derive(Debug, Clone)]
pub struct ImageTarget {
    pub source: PathBuf,
    /// File stem used to name crop outputs.
    pub stem: String,
    pub detections: PathBuf,
    /// `None` when items come from the image's sidecar.
    pub items: Option<Vec<ExpectedItem>>,
}

impl ImageTarget {
    /// Load the detector script and expected items for this image.
    pub fn load(&self) -> Result<(DetectionScript, Vec<ExpectedItem>)> {
        let script: DetectionScript = load_json(&self.detections)?;
        let items = match &self.items {
            Some(items) => items.clone(),
            None => {
                let sidecar = sidecar_path(&self.source, ITEMS_SUFFIX);
                load_json(&sidecar).with_context(|| {
                    format!("no expected items for {}", self.source.display())
                })?
            }
        };
        Ok((script, items))
    }
}

/// Collect all image paths from a file or directory.
pub fn collect_images(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    if !path.is_dir() {
        anyhow::bail!(
            "input path is neither file nor directory: {}",
            path.display()
        );
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        if let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) {
            let ext_lower = ext.to_ascii_lowercase();
            if IMAGE_EXTENSIONS.contains(&ext_lower.as_str()) {
                images.push(entry.path().to_path_buf());
            } else {
                debug!("Skipping non-image file {}", entry.path().display());
            }
        }
    }
    images.sort();
    Ok(images)
}

/// Resolve every image under `--input` into a processing target.
pub fn collect_targets(input: &Path, args: &CropArgs) -> Result<Vec<ImageTarget>> {
    let images = collect_images(input)?;
    if images.is_empty() {
        anyhow::bail!(
            "no images found at {} (supported extensions: {})",
            input.display(),
            IMAGE_EXTENSIONS.join(", ")
        );
    }
    if args.detections.is_some() && images.len() > 1 {
        anyhow::bail!("--detections only applies to a single input image; use sidecar files");
    }

    let shared_items = shared_items(args)?;
    Ok(images
        .into_iter()
        .map(|source| {
            let detections = args
                .detections
                .clone()
                .unwrap_or_else(|| sidecar_path(&source, DETECTIONS_SUFFIX));
            ImageTarget {
                stem: file_stem(&source),
                detections,
                items: shared_items.clone(),
                source,
            }
        })
        .collect())
}

/// Items given on the command line, if any.
fn shared_items(args: &CropArgs) -> Result<Option<Vec<ExpectedItem>>> {
    if let Some(list) = args.items.as_deref() {
        let items = parse_item_list(list);
        anyhow::ensure!(!items.is_empty(), "--items contains no labels");
        return Ok(Some(items));
    }
    if let Some(path) = args.items_file.as_ref() {
        let items: Vec<ExpectedItem> = load_json(path)?;
        return Ok(Some(items));
    }
    Ok(None)
}

/// Split a comma-separated label list, dropping blanks.
pub fn parse_item_list(list: &str) -> Vec<ExpectedItem> {
    list.split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(ExpectedItem::new)
        .collect()
}

/// `<dir>/<stem>.<suffix>` next to `image`.
pub fn sidecar_path(image: &Path, suffix: &str) -> PathBuf {
    image.with_file_name(format!("{}.{suffix}", file_stem(image)))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image")
        .to_string()
}
