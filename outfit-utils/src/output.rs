//! Helpers for writing cropped regions to disk.
//!
//! The encoder is picked from [`OutputFormat`] rather than from the file
//! extension so that the CLI and batch drivers produce identical files for the
//! same settings.

use crate::config::OutputFormat;

use anyhow::{Context, Result};
use image::{
    DynamicImage, ExtendedColorType, ImageEncoder,
    codecs::{jpeg::JpegEncoder, png::PngEncoder, webp::WebPEncoder},
};
use log::debug;
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

/// Encoding options for a single exported crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub format: OutputFormat,
    pub jpeg_quality: u8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            jpeg_quality: 90,
        }
    }
}

/// Build `<stem>_<index>_<label>.<ext>` inside `dir`, keeping only filename-safe characters.
pub fn crop_file_name(
    dir: &Path,
    stem: &str,
    index: usize,
    label: &str,
    format: OutputFormat,
) -> PathBuf {
    let slug: String = label
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let slug = slug.trim_matches('_');
    let slug = if slug.is_empty() { "item" } else { slug };
    dir.join(format!("{stem}_{index}_{slug}.{}", format.extension()))
}

/// Encode `image` and write it to `path`, creating parent directories as needed.
pub fn save_crop(image: &DynamicImage, path: &Path, options: ExportOptions) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    match options.format {
        OutputFormat::Png => {
            let rgba = image.to_rgba8();
            PngEncoder::new(&mut writer)
                .write_image(
                    rgba.as_raw(),
                    rgba.width(),
                    rgba.height(),
                    ExtendedColorType::Rgba8,
                )
                .with_context(|| format!("failed to encode PNG {}", path.display()))?;
        }
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = image.to_rgb8();
            JpegEncoder::new_with_quality(&mut writer, options.jpeg_quality.clamp(1, 100))
                .write_image(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    ExtendedColorType::Rgb8,
                )
                .with_context(|| format!("failed to encode JPEG {}", path.display()))?;
        }
        OutputFormat::Webp => {
            let rgba = image.to_rgba8();
            WebPEncoder::new_lossless(&mut writer)
                .write_image(
                    rgba.as_raw(),
                    rgba.width(),
                    rgba.height(),
                    ExtendedColorType::Rgba8,
                )
                .with_context(|| format!("failed to encode WebP {}", path.display()))?;
        }
    }

    debug!("Saved {} crop to {}", options.format, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};
    use tempfile::tempdir;

    #[test]
    fn crop_file_name_slugifies_label() {
        let path = crop_file_name(Path::new("out"), "look", 2, "Gray Shirt!", OutputFormat::Jpeg);
        assert_eq!(path, Path::new("out").join("look_2_gray_shirt.jpg"));

        let path = crop_file_name(Path::new("out"), "look", 0, "???", OutputFormat::Png);
        assert_eq!(path, Path::new("out").join("look_0_item.png"));
    }

    #[test]
    fn save_crop_writes_readable_files() {
        let dir = tempdir().expect("tempdir");
        let image =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(12, 8, Rgba([10, 200, 30, 255])));

        for format in [OutputFormat::Png, OutputFormat::Jpeg, OutputFormat::Webp] {
            let path = crop_file_name(&dir.path().join("nested"), "img", 0, "shirt", format);
            save_crop(
                &image,
                &path,
                ExportOptions {
                    format,
                    jpeg_quality: 80,
                },
            )
            .expect("save crop");
            let reloaded = image::open(&path).expect("reopen crop");
            assert_eq!(reloaded.dimensions(), (12, 8));
        }
    }
}
