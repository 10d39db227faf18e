//! The UI/RT/worker message plane (§4.6, §9 "Message passing").
//!
//! Three [`Varchunk`](crate::varchunk::Varchunk) rings decouple the three
//! threads that ever touch the graph:
//!
//! - `ui_to_app`: UI thread enqueues patch requests and control changes,
//!   drained by the application thread (which owns the [`crate::graph::Graph`]).
//! - `app_to_worker`: the RT callback enqueues slow work (plugin
//!   instantiation, file I/O) a module's `run` asked for, drained by a
//!   worker thread.
//! - `worker_to_app`: the worker thread's results (and RT trace events —
//!   see the module doc on logging policy) flow back for the app/UI side
//!   to pick up.
//!
//! Every ring carries length-prefixed [`Atom`] payloads. The RT thread
//! drains at most [`MAX_DRAIN_PER_BLOCK`] messages per block so a burst of
//! UI activity can never make one audio callback run unboundedly long.

use crate::atom::{read_atom, Atom, AtomError, Forge};
use crate::varchunk::Varchunk;

/// Per-block cap on messages drained from a ring on the real-time side.
/// Remaining messages simply wait for the next block.
pub const MAX_DRAIN_PER_BLOCK: usize = 10;

/// Default per-ring capacity in bytes.
pub const DEFAULT_RING_CAPACITY: usize = 16 * 1024;

pub struct MessagePlane {
    pub ui_to_app: Varchunk,
    pub app_to_worker: Varchunk,
    pub worker_to_app: Varchunk,
}

impl MessagePlane {
    #[must_use]
    pub fn new(ring_capacity: usize) -> Self {
        Self {
            ui_to_app: Varchunk::new(ring_capacity),
            app_to_worker: Varchunk::new(ring_capacity),
            worker_to_app: Varchunk::new(ring_capacity),
        }
    }
}

impl Default for MessagePlane {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}

/// Encodes `atom` and pushes it onto `ring`. Returns `Err` without having
/// mutated the ring if there isn't room — the caller decides whether to
/// drop the message or retry next block (§7 `NoSpace`).
pub fn send(ring: &Varchunk, atom: &Atom, scratch_len: usize) -> Result<(), AtomError> {
    let mut scratch = vec![0u8; scratch_len];
    let mut forge = Forge::new(&mut scratch);
    forge.write_atom(atom)?;
    let used = forge.position();
    let Some(buf) = ring.write_request(used) else {
        return Err(AtomError::Overflow);
    };
    buf.copy_from_slice(&scratch[..used]);
    ring.write_advance(used);
    Ok(())
}

/// Drains up to `MAX_DRAIN_PER_BLOCK` messages from `ring`, calling `f` with
/// each decoded atom in order. Malformed payloads are skipped rather than
/// stopping the drain.
pub fn drain_bounded(ring: &Varchunk, mut f: impl FnMut(Atom)) {
    for _ in 0..MAX_DRAIN_PER_BLOCK {
        let Some((payload, _)) = ring.read_request() else {
            break;
        };
        if let Ok((atom, _)) = read_atom(payload) {
            f(atom);
        }
        ring.read_advance();
    }
}

/// Drains every available message regardless of count, for use off the
/// real-time thread (worker/UI sides, where there is no per-block budget).
pub fn drain_all(ring: &Varchunk, mut f: impl FnMut(Atom)) {
    loop {
        let Some((payload, _)) = ring.read_request() else {
            break;
        };
        if let Ok((atom, _)) = read_atom(payload) {
            f(atom);
        }
        ring.read_advance();
    }
}
