//! Graph runtime for a modular, LV2-style audio plugin host.
//!
//! This crate owns the real-time-safe pieces: the module graph and its two
//! interchangeable runners ([`graph`]), the atom wire format and URID
//! interning used to move typed data between threads ([`atom`], [`urid`]),
//! the lock-free ring the UI/RT/worker threads pass messages over
//! ([`varchunk`], [`message`]), click-free connection ramps ([`ramp`]),
//! MIDI-CC automation ([`automation`]), the plugin ABI ([`plugin`]), worker
//! threads for off-RT-thread plugin work ([`worker`]), the patch/UI
//! protocol ([`patch`]), and logical save/restore state ([`state`]).
//!
//! Concrete audio backends, plugin discovery, and on-disk encodings are
//! deliberately out of scope here — see `synthpod-io`, `synthpod-registry`,
//! and `synthpod-config` respectively.

pub mod atom;
pub mod automation;
pub mod error;
pub mod graph;
pub mod message;
pub mod module;
pub mod patch;
pub mod plugin;
pub mod port;
pub mod ramp;
pub mod state;
pub mod urid;
pub mod varchunk;
pub mod worker;

pub use atom::{Atom, AtomError, Forge};
pub use automation::{AutomationKind, AutomationSlot, AutomationTable, AutomationTarget};
pub use error::GraphError;
pub use graph::Graph;
pub use message::MessagePlane;
pub use module::{Lifecycle, Module, ModuleId};
pub use patch::{dispatch as dispatch_patch, EngineState, PatchError, PatchRequest, PatchTarget};
pub use plugin::{descriptor_for, Descriptor, Instance, Plugin};
pub use port::{
    AtomPortKind, ControlRange, Direction, EventVocabulary, Port, PortBuffer, PortKind, PortRef,
    SourceLink,
};
pub use ramp::{Ramp, RampState};
pub use state::GraphState;
pub use urid::{Urid, UridMap};
pub use varchunk::Varchunk;
pub use worker::{ModuleWorker, WorkerPool};
