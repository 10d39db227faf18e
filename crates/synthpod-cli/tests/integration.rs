//! Integration tests for synthpod-cli.
//!
//! Tests invoke the built `synthpod` binary directly and check its
//! stdout/exit status, matching how a user would drive it from a shell.

use std::process::Command;
use tempfile::TempDir;

fn synthpod_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_synthpod"))
}

#[test]
fn cli_plugins_lists_the_built_in_catalog() {
    let output = synthpod_bin().arg("plugins").output().expect("failed to run synthpod plugins");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("urn:synthpod:test:oscillator"));
    assert!(stdout.contains("urn:synthpod:test:gain"));
    assert!(stdout.contains("urn:synthpod:test:passthrough"));
    assert!(stdout.contains("urn:synthpod:test:attenuator"));
}

#[test]
fn cli_run_reports_timing_for_every_module() {
    let output = synthpod_bin()
        .args(["run", "--blocks", "3", "--block-size", "64"])
        .output()
        .expect("failed to run synthpod run");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Ran 3 block(s)"));
    assert!(stdout.contains("count=3"));
}

#[test]
fn cli_driver_simulates_blocks_without_error() {
    let output = synthpod_bin()
        .args(["driver", "--blocks", "2"])
        .output()
        .expect("failed to run synthpod driver");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("simulated 2 block(s)"));
}

#[test]
fn cli_bundle_save_then_load_round_trips() {
    let dir = TempDir::new().unwrap();
    let bundle_path = dir.path().join("demo.toml");

    let save = synthpod_bin()
        .args(["bundle", "save", bundle_path.to_str().unwrap()])
        .output()
        .expect("failed to run synthpod bundle save");
    assert!(save.status.success());
    assert!(bundle_path.is_file());

    let load = synthpod_bin()
        .args(["bundle", "load", bundle_path.to_str().unwrap()])
        .output()
        .expect("failed to run synthpod bundle load");
    assert!(load.status.success());

    let stdout = String::from_utf8_lossy(&load.stdout);
    assert!(stdout.contains("urn:synthpod:test:oscillator"));
    assert!(stdout.contains("urn:synthpod:test:gain"));
}

#[test]
fn cli_config_prints_toml_by_default() {
    let output = synthpod_bin().arg("config").output().expect("failed to run synthpod config");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sample_rate"));
    assert!(stdout.contains("ramp_duration_secs"));
}
