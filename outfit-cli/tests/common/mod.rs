/// Common test utilities and macros for CLI integration tests
use std::{fs, path::Path};

use image::{Rgb, RgbImage};
use serde_json::{Value, json};

/// Synthetic 400x600 "outfit" photo: a gray top over blue trousers.
pub fn write_outfit_image(path: &Path) {
    let mut canvas = RgbImage::from_pixel(400, 600, Rgb([225, 220, 215]));
    for y in 80..300 {
        for x in 100..300 {
            canvas.put_pixel(x, y, Rgb([130, 130, 135]));
        }
    }
    for y in 290..560 {
        for x in 120..280 {
            canvas.put_pixel(x, y, Rgb([35, 55, 115]));
        }
    }
    canvas.save(path).expect("save synthetic image");
}

/// Recorded detector output matching [`write_outfit_image`].
pub fn outfit_script() -> Value {
    json!({
        "attempts": [[
            { "box": { "xyxy": [100, 80, 300, 300] }, "score": 0.88, "phrase": "gray shirt" },
            { "box": { "xyxy": [120, 290, 280, 560] }, "score": 0.81, "phrase": "blue trousers" }
        ]]
    })
}

pub fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_vec_pretty(value).expect("encode json")).expect("write json");
}

#[allow(dead_code)]
pub fn read_report(path: &Path) -> Value {
    let contents = fs::read_to_string(path).expect("read report");
    serde_json::from_str(&contents).expect("parse report")
}

/// Macro to set up a temp directory with one synthetic image and its detections.
///
/// Creates:
/// - `temp_dir: TempDir` - temporary directory
/// - `image_path: PathBuf` - synthetic `look.png`
/// - `detections_path: PathBuf` - `look.detections.json` sidecar
/// - `output_dir: PathBuf` - path for crop output
#[macro_export]
macro_rules! cli_test_setup {
    () => {{
        let temp_dir = tempfile::TempDir::new().expect("create temp dir");
        let image_path = temp_dir.path().join("look.png");
        let detections_path = temp_dir.path().join("look.detections.json");
        let output_dir = temp_dir.path().join("output");
        $crate::common::write_outfit_image(&image_path);
        $crate::common::write_json(&detections_path, &$crate::common::outfit_script());

        (temp_dir, image_path, detections_path, output_dir)
    }};
}

/// Macro to verify output files exist in directory.
///
/// Returns a Vec of DirEntry for files matching the extension.
#[macro_export]
macro_rules! verify_output_files {
    ($output_dir:expr, $ext:literal) => {{
        std::fs::read_dir(&$output_dir)
            .expect("read output dir")
            .filter_map(Result::ok)
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e == $ext)
                    .unwrap_or(false)
            })
            .collect::<Vec<_>>()
    }};
}

/// Macro to run the CLI on an input path with extra arguments.
#[macro_export]
macro_rules! run_cli {
    ($input:expr, [$($arg:expr),*]) => {{
        std::process::Command::new(env!("CARGO_BIN_EXE_outfit-cli"))
            .args([
                "--input",
                $input.to_str().unwrap(),
                $($arg,)*
            ])
            .output()
            .expect("execute CLI")
    }};
}

/// Macro to assert CLI success and print stderr on failure.
#[macro_export]
macro_rules! assert_cli_success {
    ($output:expr, $msg:literal) => {{
        if !$output.status.success() {
            eprintln!("CLI stderr: {}", String::from_utf8_lossy(&$output.stderr));
        }
        assert!($output.status.success(), $msg);
    }};
}
