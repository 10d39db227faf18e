//! Port model (§3 "Port", §4.3).
//!
//! A port is identified by `(module, index)` — see [`PortRef`] — and owns a
//! typed buffer sized for the maximum block, plus the bookkeeping the
//! multiplexer and UI-subscription machinery need each block.

use crate::module::ModuleId;
use crate::ramp::Ramp;
use crate::urid::Urid;

/// Identifies a port by its owning module and index within that module's
/// port array, per the arena+indices design note in §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub module: ModuleId,
    pub index: usize,
}

impl PortRef {
    #[must_use]
    pub fn new(module: ModuleId, index: usize) -> Self {
        Self { module, index }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Kind of atom-port framing. Per the resolved open question in §9/§12,
/// atom ports default to `Sequence` unless a module explicitly declares a
/// plain one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AtomPortKind {
    #[default]
    Sequence,
    Plain,
}

/// Event vocabularies an Event-typed port declares support for, as an OR of
/// bit flags (no external bitflags dependency needed for five constants).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventVocabulary(pub u8);

impl EventVocabulary {
    pub const MIDI: Self = Self(1 << 0);
    pub const OSC: Self = Self(1 << 1);
    pub const TIME: Self = Self(1 << 2);
    pub const PATCH: Self = Self(1 << 3);
    pub const VOICE: Self = Self(1 << 4);

    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for EventVocabulary {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Attributes specific to a Control port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub integer: bool,
    pub toggled: bool,
    pub logarithmic: bool,
    pub is_bitmask: bool,
}

impl ControlRange {
    #[must_use]
    pub fn new(min: f32, max: f32, default: f32) -> Self {
        Self {
            min,
            max,
            default,
            integer: false,
            toggled: false,
            logarithmic: false,
            is_bitmask: false,
        }
    }

    #[must_use]
    pub fn clamp(&self, value: f32) -> f32 {
        let v = value.clamp(self.min, self.max);
        if self.integer { v.round() } else { v }
    }
}

/// Per-port type and type-specific metadata.
#[derive(Debug, Clone)]
pub enum PortKind {
    Audio,
    Cv,
    Control(ControlRange),
    Atom {
        framing: AtomPortKind,
        /// Declared sequence capacity in bytes (ignored for `Plain`).
        capacity: usize,
    },
    Event(EventVocabulary),
}

/// The port's typed storage. Audio/CV are sized to the engine's max block
/// length; Atom is sized to the port's declared sequence capacity; Control
/// is a single scalar. Per the invariants in §3, an output port's `buf` is
/// read by every sink connected to it, and an input port's `buf` is written
/// either by the multiplexer (fan-in/mixing) or, for the single-source
/// unit-gain case, aliased directly to the source (see [`crate::graph`]).
#[derive(Debug, Clone)]
pub enum PortBuffer {
    Audio(Vec<f32>),
    Cv(Vec<f32>),
    Control(f32),
    Atom(Vec<u8>),
}

impl PortBuffer {
    #[must_use]
    pub fn for_kind(kind: &PortKind, max_block: usize) -> Self {
        match kind {
            PortKind::Audio => PortBuffer::Audio(vec![0.0; max_block]),
            PortKind::Cv => PortBuffer::Cv(vec![0.0; max_block]),
            PortKind::Control(range) => PortBuffer::Control(range.default),
            PortKind::Atom { capacity, .. } => PortBuffer::Atom(vec![0u8; *capacity]),
            PortKind::Event(_) => PortBuffer::Atom(vec![0u8; max_block.max(64)]),
        }
    }

    #[must_use]
    pub fn as_audio(&self) -> Option<&[f32]> {
        match self {
            PortBuffer::Audio(b) | PortBuffer::Cv(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_audio_mut(&mut self) -> Option<&mut [f32]> {
        match self {
            PortBuffer::Audio(b) | PortBuffer::Cv(b) => Some(b),
            _ => None,
        }
    }

    pub fn fill_silence(&mut self) {
        match self {
            PortBuffer::Audio(b) | PortBuffer::Cv(b) => b.iter_mut().for_each(|s| *s = 0.0),
            PortBuffer::Control(v) => *v = 0.0,
            PortBuffer::Atom(bytes) => bytes.iter_mut().for_each(|b| *b = 0),
        }
    }
}

/// One entry in an input port's inbound fan-in list (§3 "Connection").
#[derive(Debug, Clone, Copy)]
pub struct SourceLink {
    pub src: PortRef,
    pub gain: f32,
    pub ramp: Ramp,
}

/// A module port: direction, type, buffer, and the subscription/ramp/automation
/// state the runners and message plane mutate each block.
#[derive(Debug, Clone)]
pub struct Port {
    pub direction: Direction,
    pub kind: PortKind,
    pub buf: PortBuffer,
    /// Count of UI subscribers — a count, not a boolean, so nested
    /// subscribers are supported per §4.3.
    pub subscriptions: u32,
    /// Transfer encoding protocol the UI expects for this port's updates.
    pub protocol: Option<Urid>,
    /// Last scalar value sent upward, for change detection on Control ports.
    pub last: Option<f32>,
    /// Port-level silencing ramp (e.g. whole-module bypass/dying), distinct
    /// from the per-source ramps in `sources`.
    pub ramp: Ramp,
    /// Inbound fan-in list. Only meaningful (and only ever populated) for
    /// input ports per the invariant in §3.
    pub sources: Vec<SourceLink>,
}

impl Port {
    #[must_use]
    pub fn new(direction: Direction, kind: PortKind, max_block: usize) -> Self {
        let buf = PortBuffer::for_kind(&kind, max_block);
        Self {
            direction,
            kind,
            buf,
            subscriptions: 0,
            protocol: None,
            last: None,
            ramp: Ramp::settled_on(),
            sources: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_input(&self) -> bool {
        self.direction == Direction::Input
    }

    /// A port with an empty `sources` list produces silence / an empty
    /// sequence — invariant 3 in §8.
    #[must_use]
    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }

    pub fn subscribe(&mut self, protocol: Urid) {
        self.subscriptions += 1;
        self.protocol = Some(protocol);
    }

    /// Returns `true` once the last subscriber is gone.
    pub fn unsubscribe(&mut self) -> bool {
        self.subscriptions = self.subscriptions.saturating_sub(1);
        self.subscriptions == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleId;

    #[test]
    fn control_range_clamps_and_rounds_integers() {
        let mut range = ControlRange::new(0.0, 10.0, 5.0);
        range.integer = true;
        assert_eq!(range.clamp(12.7), 10.0);
        assert_eq!(range.clamp(-3.0), 0.0);
        assert_eq!(range.clamp(4.6), 5.0);
    }

    #[test]
    fn new_port_buffer_matches_kind_and_default() {
        let port = Port::new(Direction::Output, PortKind::Audio, 64);
        assert_eq!(port.buf.as_audio().unwrap().len(), 64);

        let ctrl = Port::new(
            Direction::Input,
            PortKind::Control(ControlRange::new(0.0, 1.0, 0.5)),
            64,
        );
        match ctrl.buf {
            PortBuffer::Control(v) => assert_eq!(v, 0.5),
            _ => panic!("expected control buffer"),
        }
    }

    #[test]
    fn subscribe_unsubscribe_tracks_count() {
        let mut port = Port::new(Direction::Output, PortKind::Audio, 8);
        port.subscribe(Urid(7));
        port.subscribe(Urid(7));
        assert_eq!(port.subscriptions, 2);
        assert!(!port.unsubscribe());
        assert!(port.unsubscribe());
    }

    #[test]
    fn empty_sources_means_no_sources() {
        let mut port = Port::new(Direction::Input, PortKind::Audio, 8);
        assert!(!port.has_sources());
        port.sources.push(SourceLink {
            src: PortRef::new(ModuleId(0), 0),
            gain: 1.0,
            ramp: Ramp::settled_on(),
        });
        assert!(port.has_sources());
    }

    #[test]
    fn event_vocabulary_bitor_and_contains() {
        let v = EventVocabulary::MIDI | EventVocabulary::PATCH;
        assert!(v.contains(EventVocabulary::MIDI));
        assert!(v.contains(EventVocabulary::PATCH));
        assert!(!v.contains(EventVocabulary::OSC));
    }
}
