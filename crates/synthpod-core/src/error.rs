//! Graph wiring errors (§7, the subset that applies to connecting modules
//! rather than the patch/atom protocol — see [`crate::patch::PatchError`]
//! for that taxonomy).

use crate::port::PortRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("module not found")]
    ModuleNotFound,
    #[error("port {0:?} not found")]
    PortNotFound(PortRef),
    #[error("cannot connect an input port as a source or an output port as a sink")]
    DirectionMismatch,
    #[error("port types are incompatible for connection")]
    TypeMismatch,
    #[error("ports are already connected")]
    AlreadyConnected,
    #[error("no such connection to remove")]
    NotConnected,
}
