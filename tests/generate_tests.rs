//! pacs-gen integration tests with fake generator tools
#![cfg(unix)]

mod common;

use common::TestWorkspace;
use predicates::prelude::*;
use serde_json::Value;

fn json_report(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout should be a JSON report")
}

#[test]
fn test_failing_descriptor_does_not_stop_the_batch() {
    let workspace = TestWorkspace::new();
    workspace.install_generator_tools();
    workspace.write_file("svd/A.svd", "<device/>");
    workspace.write_file("svd/B.svd", "<device/>");

    let output = workspace
        .pacs_cmd()
        .args(["--json", "pacs-gen", "--svd-dir", "svd"])
        .assert()
        .failure()
        .code(1)
        .get_output()
        .stdout
        .clone();

    let report = json_report(&output);
    assert_eq!(report["operation"], "pacs-gen");
    let results = report["results"].as_array().expect("results array");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["target"], "a");
    assert_eq!(results[0]["status"], "succeeded");
    assert_eq!(results[1]["target"], "b");
    assert_eq!(results[1]["status"], "failed");
    assert_eq!(results[1]["error"]["kind"], "generation");
    assert_eq!(results[1]["error"]["tool"], "svd2rust");
    assert_eq!(results[1]["error"]["exit_code"], 1);

    assert!(workspace.file_exists("pacs/a/src/a/mod.rs"));
    assert!(workspace.file_exists("pacs/a/src/a/device.x"));
    assert!(workspace.file_exists("pacs/a/src/generic.rs"));
    assert!(!workspace.file_exists("pacs/b/src/b"));
}

#[test]
fn test_summary_lists_every_target() {
    let workspace = TestWorkspace::new();
    workspace.install_generator_tools();
    workspace.write_file("svd/A.svd", "<device/>");
    workspace.write_file("svd/B.svd", "<device/>");

    workspace
        .pacs_cmd()
        .args(["pacs-gen", "--svd-dir", "svd", "--out-dir", "out"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("pacs-gen summary"))
        .stdout(predicate::str::contains("✓ a"))
        .stdout(predicate::str::contains("✗ b GenerationError"))
        .stdout(predicate::str::contains("1 succeeded, 0 skipped, 1 failed"));
    assert!(workspace.file_exists("out/a/src/a/mod.rs"));
}

#[test]
fn test_generator_runs_once_per_descriptor_in_order() {
    let workspace = TestWorkspace::new();
    workspace.install_generator_tools();
    workspace.write_file("svd/efm32g/EFM32G230F128.svd", "<device/>");
    workspace.write_file("svd/efm32g/EFM32G200F16.svd", "<device/>");
    workspace.write_file("svd/C.svd", "<device/>");

    workspace
        .pacs_cmd()
        .args(["pacs-gen", "--svd-dir", "svd"])
        .assert()
        .success();

    let calls: Vec<String> = workspace
        .tool_log("svd2rust")
        .iter()
        .filter_map(|line| line.rsplit('/').next().map(str::to_string))
        .collect();
    assert_eq!(
        calls,
        vec!["C.svd", "EFM32G200F16.svd", "EFM32G230F128.svd"]
    );
    assert_eq!(workspace.tool_log("rustfmt").len(), 3);
}

#[test]
fn test_parallel_jobs_keep_report_order() {
    let workspace = TestWorkspace::new();
    workspace.install_generator_tools();
    for name in ["D", "C", "A", "E"] {
        workspace.write_file(&format!("svd/fam/{name}.svd"), "<device/>");
    }

    let output = workspace
        .pacs_cmd()
        .args(["--json", "-j", "3", "pacs-gen", "--svd-dir", "svd"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report = json_report(&output);
    let targets: Vec<&str> = report["results"]
        .as_array()
        .expect("results array")
        .iter()
        .filter_map(|r| r["target"].as_str())
        .collect();
    assert_eq!(targets, vec!["fam/a", "fam/c", "fam/d", "fam/e"]);
    assert!(workspace.file_exists("pacs/fam/src/generic.rs"));
}

#[test]
fn test_empty_input_directory() {
    let workspace = TestWorkspace::new();
    workspace.install_generator_tools();
    workspace.create_dir("svd");

    workspace
        .pacs_cmd()
        .args(["pacs-gen", "--svd-dir", "svd"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no targets"))
        .stderr(predicate::str::contains("No targets found"));
    assert!(workspace.tool_log("svd2rust").is_empty());
}

#[test]
fn test_missing_input_directory() {
    let workspace = TestWorkspace::new();
    workspace.install_generator_tools();

    workspace
        .pacs_cmd()
        .args(["pacs-gen", "--svd-dir", "svd"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Input directory not found"));
}

#[test]
fn test_missing_meta_file_is_fatal() {
    let workspace = TestWorkspace::new();
    workspace.install_generator_tools();
    workspace.write_file("svd/A.svd", "<device/>");

    workspace
        .pacs_cmd()
        .args(["pacs-gen", "--svd-dir", "svd", "--meta", "nope.toml"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Metadata file not found"));
    assert!(workspace.tool_log("svd2rust").is_empty());
}

#[test]
fn test_scaffolds_package_from_metadata() {
    let workspace = TestWorkspace::new();
    workspace.install_generator_tools();
    workspace.write_file("svd/efm32hg/EFM32HG108F32.svd", "<device/>");
    workspace.write_file("svd/efm32hg/EFM32HG350F64.svd", "<device/>");
    workspace.write_file(
        "mcu.toml",
        r#"
[efm32hg]
name = "EFM32 Happy Gecko"
repository = "https://github.com/efm32-rs/efm32hg-pacs"
version = "0.1.3"

[efm32hg.target.arch]
efm32hg = "thumbv6m-none-eabi"
"#,
    );

    workspace
        .pacs_cmd()
        .args(["pacs-gen", "--svd-dir", "svd"])
        .assert()
        .success();

    let manifest = workspace.read_file("pacs/efm32hg/Cargo.toml");
    assert!(manifest.contains("name = \"efm32hg-pac\""));
    assert!(manifest.contains("version = \"0.1.3\""));
    assert!(manifest.contains("efm32hg108f32"));
    assert!(manifest.contains("efm32hg350f64"));
    assert!(workspace.file_exists("pacs/efm32hg/src/lib.rs"));
    assert!(workspace.file_exists("pacs/efm32hg/build.rs"));
    assert!(workspace.file_exists("pacs/efm32hg/README.md"));
    assert!(workspace.file_exists("pacs/efm32hg/.cargo/config.toml"));
}
