mod args;
mod config;
mod input;
mod types;

use std::{fs, fs::File, path::Path, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info, warn};
use outfit_core::{
    BatchJob, BatchOutcome, PipelineConfig, ReplayDetector, extract_crop, process_batch,
};
use outfit_utils::{
    ExportOptions, configure_telemetry, crop_file_name, init_logging, normalize_path, save_crop,
};

use crate::{
    args::CropArgs,
    config::{apply_cli_overrides, load_settings},
    input::{ImageTarget, collect_targets},
    types::ImageReport,
};

fn main() -> Result<()> {
    init_logging(LevelFilter::Info)?;
    let args = CropArgs::parse();

    let mut settings = load_settings(args.config.as_ref())?;
    apply_cli_overrides(&mut settings, &args);
    configure_telemetry(
        settings.telemetry.enabled,
        settings.telemetry.level_filter(),
    );

    let input_path = normalize_path(&args.input)?;
    let output_dir = if let Some(dir) = args.output_dir.as_ref() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        Some(normalize_path(dir)?)
    } else {
        None
    };

    let targets = collect_targets(&input_path, &args)?;
    info!("Processing {} image(s)...", targets.len());

    let config = PipelineConfig::from(&settings);
    let export = ExportOptions {
        format: settings.crop.output_format,
        jpeg_quality: settings.crop.jpeg_quality,
    };

    let mut slots: Vec<Option<ImageReport>> = targets.iter().map(|_| None).collect();
    let mut jobs = Vec::with_capacity(targets.len());
    let mut job_slots = Vec::with_capacity(targets.len());
    for (slot, target) in targets.iter().enumerate() {
        match prepare_job(target) {
            Ok(job) => {
                jobs.push(job);
                job_slots.push(slot);
            }
            Err(err) => {
                warn!("Failed to prepare {}: {err:#}", target.source.display());
                slots[slot] = Some(ImageReport::failed(display(&target.source), &err));
            }
        }
    }

    let outcomes = process_batch(jobs, &config, None);
    for (slot, outcome) in job_slots.into_iter().zip(outcomes) {
        let report = finish_image(&targets[slot], outcome, output_dir.as_deref(), export);
        slots[slot] = Some(report);
    }
    let results: Vec<ImageReport> = slots.into_iter().flatten().collect();

    if results.iter().all(|r| r.report.is_none()) {
        anyhow::bail!("all images failed; cannot produce output");
    }

    if let Some(json_path) = args.json.as_ref() {
        if let Some(dir) = json_path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        let file = File::create(json_path)
            .with_context(|| format!("failed to create {}", json_path.display()))?;
        serde_json::to_writer_pretty(file, &results)
            .with_context(|| format!("failed to write report JSON to {}", json_path.display()))?;
        info!("Wrote report to {}", json_path.display());
    } else {
        let json = serde_json::to_string_pretty(&results).context("failed to serialize report")?;
        println!("{json}");
    }

    Ok(())
}

fn prepare_job(target: &ImageTarget) -> Result<BatchJob> {
    let image = image::open(&target.source)
        .with_context(|| format!("failed to open image {}", target.source.display()))?;
    let (script, items) = target.load()?;
    Ok(BatchJob {
        name: display(&target.source),
        image,
        items,
        detector: Arc::new(ReplayDetector::new(script)),
    })
}

fn finish_image(
    target: &ImageTarget,
    outcome: BatchOutcome,
    output_dir: Option<&Path>,
    export: ExportOptions,
) -> ImageReport {
    let report = match outcome.result {
        Ok(report) => report,
        Err(err) => return ImageReport::failed(outcome.name, &anyhow::Error::new(err)),
    };

    info!(
        "{} -> {} crop(s), {} filtered, {} missing after {} attempt(s)",
        outcome.name,
        report.crops.len(),
        report.filtered.len(),
        report.missing.len(),
        report.attempts
    );

    let mut crop_files = Vec::new();
    if let Some(dir) = output_dir {
        for (index, crop) in report.crops.iter().enumerate() {
            let path = crop_file_name(dir, &target.stem, index + 1, &crop.label, export.format);
            let cropped = extract_crop(&outcome.image, crop);
            match save_crop(&cropped, &path, export) {
                Ok(()) => crop_files.push(display(&path)),
                Err(err) => warn!("Failed to save crop {}: {err:#}", path.display()),
            }
        }
    }

    ImageReport {
        image: outcome.name,
        report: Some(report),
        crop_files,
        error: None,
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
