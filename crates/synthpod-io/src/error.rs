//! Driver-side error taxonomy (§7).

/// Errors a [`crate::driver::BackendDriver`] can report to its caller.
///
/// These map onto §7's general taxonomy where the driver boundary produces
/// one of those kinds: a device that cannot be opened is `Unsupported`, a
/// malformed bundle path is `Unknown`, and so on. Errors here never cross
/// onto the RT thread directly — a failing `run_pre`/`run_post` call is the
/// backend's problem to recover from (skip the block, log, retry next
/// block), not the engine's.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("no audio device available")]
    NoDevice,

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("requested stream configuration is not supported: {0}")]
    Unsupported(String),

    #[error("stream setup failed: {0}")]
    StreamSetup(String),

    #[error("bundle I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DriverError>;
