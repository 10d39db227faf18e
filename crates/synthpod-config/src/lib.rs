//! TOML encoding of Synthpod's logical graph state and engine
//! configuration.
//!
//! This crate is the on-disk half of `synthpod-core::state`: the core
//! defines `GraphState` as a logical save/restore tree with no opinion on
//! encoding, and this crate turns it into (and out of) TOML, plus a
//! `DriverConfig` for the engine's own startup resource knobs.
//!
//! # Example
//!
//! ```rust,no_run
//! use synthpod_config::{state, user_bundles_dir};
//!
//! let graph_state = state::load(user_bundles_dir().join("my_session.toml")).unwrap();
//! ```

mod error;

/// TOML encoding of `synthpod_core::state::GraphState`.
pub mod state;

/// Engine resource configuration (sample rate, worker threads, ramp/update
/// timing), independent of any saved graph state.
pub mod driver_config;

/// Platform-specific paths for bundles and configuration.
pub mod paths;

pub use driver_config::DriverConfig;
pub use error::ConfigError;
pub use paths::{
    bundle_name_from_path, ensure_user_bundles_dir, ensure_user_config_dir, find_bundle,
    list_all_bundles, list_system_bundles, list_user_bundles, system_bundles_dir,
    user_bundles_dir, user_config_dir,
};
pub use state::{
    ConnectionStateDto, GraphStateDto, GridAttrsDto, ModuleStateDto, PortRefDto,
};
