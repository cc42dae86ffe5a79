use std::fs;

use serde_json::{Value, json};

mod common;

use common::{outfit_script, read_report, write_json, write_outfit_image};

#[test]
fn single_image_writes_crops_and_report() {
    let (temp_dir, image_path, detections_path, output_dir) = cli_test_setup!();
    let json_path = temp_dir.path().join("report.json");

    let output = run_cli!(
        image_path,
        [
            "--items",
            "gray shirt, blue trousers",
            "--detections",
            detections_path.to_str().unwrap(),
            "--output-dir",
            output_dir.to_str().unwrap(),
            "--json",
            json_path.to_str().unwrap()
        ]
    );
    assert_cli_success!(output, "CLI should succeed on a fully matched image");

    let files = verify_output_files!(output_dir, "png");
    assert_eq!(files.len(), 2, "one crop per expected item");
    let shirt = image::open(output_dir.join("look_1_gray_shirt.png")).expect("shirt crop");
    assert_eq!((shirt.width(), shirt.height()), (220, 242));
    assert!(output_dir.join("look_2_blue_trousers.png").exists());

    let report = read_report(&json_path);
    let entry = &report[0];
    assert_eq!(entry["report"]["completion"], "all_matched");
    assert_eq!(entry["report"]["attempts"], 1);
    assert_eq!(entry["report"]["crops"].as_array().map(Vec::len), Some(2));
    assert_eq!(entry["crop_files"].as_array().map(Vec::len), Some(2));
}

#[test]
fn report_goes_to_stdout_and_respects_retry_budget() {
    let (_temp_dir, image_path, detections_path, _output_dir) = cli_test_setup!();

    let output = run_cli!(
        image_path,
        [
            "--items",
            "gray shirt,blue trousers,red scarf",
            "--detections",
            detections_path.to_str().unwrap(),
            "--max-retries",
            "1"
        ]
    );
    assert_cli_success!(output, "missing items are not a CLI failure");

    let report: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    let entry = &report[0]["report"];
    assert_eq!(entry["attempts"], 1);
    assert_eq!(entry["completion"], "budget_exhausted");
    assert_eq!(entry["missing"][0]["label"], "red scarf");
    assert_eq!(entry["trace"][0]["branch"], "too_few");
}

#[test]
fn directory_mode_uses_sidecars_and_isolates_failures() {
    let temp_dir = tempfile::TempDir::new().expect("create temp dir");
    let input_dir = temp_dir.path().join("input");
    let output_dir = temp_dir.path().join("output");
    fs::create_dir_all(&input_dir).expect("create input dir");

    write_outfit_image(&input_dir.join("a.png"));
    write_json(&input_dir.join("a.detections.json"), &outfit_script());
    write_json(
        &input_dir.join("a.items.json"),
        &json!([
            { "label": "gray shirt", "description": "Soft cotton crew neck" },
            { "label": "blue trousers" }
        ]),
    );
    // No sidecars for this one.
    write_outfit_image(&input_dir.join("b.png"));

    let output = run_cli!(
        input_dir,
        [
            "--output-dir",
            output_dir.to_str().unwrap(),
            "--format",
            "jpeg"
        ]
    );
    assert_cli_success!(output, "one good image is enough for success");

    let files = verify_output_files!(output_dir, "jpg");
    assert_eq!(files.len(), 2);

    let report: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    let entries = report.as_array().expect("array report");
    assert_eq!(entries.len(), 2);
    assert_eq!(
        entries[0]["report"]["crops"][0]["description"],
        "Soft cotton crew neck"
    );
    assert!(entries[1]["error"].is_string());
    assert!(entries[1].get("report").is_none());
}

#[test]
fn missing_input_fails() {
    let temp_dir = tempfile::TempDir::new().expect("create temp dir");
    let output = run_cli!(temp_dir.path().join("nope.png"), ["--items", "shirt"]);
    assert!(!output.status.success());
}

#[test]
fn all_images_failing_is_an_error() {
    let temp_dir = tempfile::TempDir::new().expect("create temp dir");
    let image_path = temp_dir.path().join("lonely.png");
    write_outfit_image(&image_path);

    let output = run_cli!(image_path, ["--items", "shirt"]);
    assert!(
        !output.status.success(),
        "no detections sidecar means nothing can be processed"
    );
}
