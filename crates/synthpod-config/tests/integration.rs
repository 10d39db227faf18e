//! Integration tests for synthpod-config.
//!
//! These tests verify end-to-end behavior across the `state` and
//! `driver_config` modules, including round-trips through the filesystem.

use synthpod_config::{state, DriverConfig};
use synthpod_core::module::ModuleId;
use synthpod_core::port::PortRef;
use synthpod_core::state::{ConnectionState, GraphState, GridAttrs, ModuleState};
use tempfile::TempDir;

fn sample_state() -> GraphState {
    GraphState {
        modules: vec![
            ModuleState {
                uri: "urn:synthpod:test:oscillator".into(),
                position: (0, 0),
                grid: GridAttrs { cols: 2, rows: 2, pane_left: 0 },
                bypassed: false,
                controls: vec![],
            },
            ModuleState {
                uri: "urn:synthpod:test:gain".into(),
                position: (1, 0),
                grid: GridAttrs::default(),
                bypassed: false,
                controls: vec![(2, 0.7)],
            },
        ],
        connections: vec![ConnectionState {
            src: PortRef::new(ModuleId(0), 0),
            dst: PortRef::new(ModuleId(1), 0),
            gain: 1.0,
        }],
    }
}

#[test]
fn graph_state_round_trips_through_a_saved_bundle() {
    let dir = TempDir::new().unwrap();
    let bundle_path = dir.path().join("session.toml");

    let original = sample_state();
    state::save(&original, &bundle_path).expect("save should succeed");

    let restored = state::load(&bundle_path).expect("load should succeed");
    assert_eq!(restored.modules.len(), original.modules.len());
    assert_eq!(restored.connections.len(), original.connections.len());
    assert_eq!(restored.modules[1].controls, vec![(2, 0.7)]);
    assert!(restored.touches(ModuleId(0)));
}

#[test]
fn driver_config_round_trips_alongside_a_bundle_in_the_same_directory() {
    let dir = TempDir::new().unwrap();

    let bundle_path = dir.path().join("session.toml");
    let driver_path = dir.path().join("driver.toml");

    state::save(&sample_state(), &bundle_path).unwrap();
    let driver_cfg = DriverConfig { sample_rate: 96_000, worker_threads: 2, ..Default::default() };
    driver_cfg.save(&driver_path).unwrap();

    let restored_state = state::load(&bundle_path).unwrap();
    let restored_driver_cfg = DriverConfig::load(&driver_path).unwrap();

    assert_eq!(restored_state.modules.len(), 2);
    assert_eq!(restored_driver_cfg.sample_rate, 96_000);
    assert_eq!(restored_driver_cfg.worker_threads, 2);
}

#[test]
fn loading_a_bundle_with_a_dangling_connection_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");

    let malformed = r#"
        [[modules]]
        uri = "urn:synthpod:test:gain"
        position = [0, 0]

        [[connections]]
        gain = 1.0
        [connections.src]
        module = 0
        index = 0
        [connections.dst]
        module = 9
        index = 0
    "#;
    std::fs::write(&path, malformed).unwrap();

    let err = state::load(&path).unwrap_err();
    assert!(matches!(err, synthpod_config::ConfigError::DanglingModuleRef(9)));
}
