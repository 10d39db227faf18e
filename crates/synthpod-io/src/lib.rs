//! The backend driver contract (§6): the boundary between the engine and
//! whatever owns the real-time audio thread.
//!
//! [`driver::BackendDriver`] is the trait a concrete backend implements;
//! [`dummy::DummyDriver`] is an in-process, no-hardware stand-in used by
//! tests and `synthpod-cli`. A `cpal`-backed reference driver is available
//! behind the off-by-default `cpal-backend` feature — concrete backend
//! drivers (JACK, ALSA, a DAW's plugin shell) remain external
//! collaborators; this crate does not try to be one.

#[cfg(feature = "cpal-backend")]
mod cpal_driver;
mod driver;
mod dummy;
mod error;

pub use driver::{
    BackendDriver, DriverInitConfig, DriverOption, SystemPortBuffer, SystemPortHandle,
    SystemPortType,
};
pub use dummy::DummyDriver;
pub use error::{DriverError, Result};

#[cfg(feature = "cpal-backend")]
pub use cpal_driver::CpalDriver;
