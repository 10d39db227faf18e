//! Fixed-capacity automation mapping from incoming control events to a
//! module's control ports or properties (§3 "Automation", §4.7, §4.10).
//!
//! Each module carries a small, fixed-size table of active mappings rather
//! than a growable collection, so building and tearing down mappings never
//! allocates on the real-time thread — the same const-generic, no-alloc
//! shape as a fixed-size CC-to-parameter mapper, generalized here to cover
//! both "CC -> control port" and "CC -> property URID" targets with an
//! affine mapping between the event's native range and the target's.

use crate::port::ControlRange;
use crate::urid::Urid;

/// The event source an [`AutomationTable`] entry is keyed on.
///
/// `Osc` is modeled for shape parity with a host that also automates over
/// OSC paths, but [`AutomationTable::resolve_midi_cc`] never matches it —
/// there's no OSC transport in this crate yet to produce such events.
#[derive(Debug, Clone, PartialEq)]
pub enum AutomationKind {
    /// `channel: None` is the wildcard — matches the event's channel on
    /// any of the 16 MIDI channels.
    MidiCc { channel: Option<u8>, controller: u8 },
    Osc { path: String },
}

/// A snapshot of one active mapping, for save/restore (§4.14) — the
/// logical contents of a [`MappingEntry`] without the private affine-field
/// grouping that table lookups use internally.
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationSlot {
    pub kind: AutomationKind,
    pub target: AutomationTarget,
    pub range_min: f32,
    pub range_max: f32,
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub mul: f32,
    pub add: f32,
}

/// What an automation mapping drives once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationTarget {
    ControlPort(usize),
    Property(Urid),
}

#[derive(Debug, Clone)]
struct MappingEntry {
    kind: AutomationKind,
    target: AutomationTarget,
    /// Carried for logical-state fidelity (round-trips through save/restore
    /// unchanged); `resolve_midi_cc` computes purely from `mul`/`add`/`c`/`d`.
    range_min: f32,
    range_max: f32,
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    mul: f32,
    add: f32,
}

fn same_source(a: &AutomationKind, b: &AutomationKind) -> bool {
    match (a, b) {
        (
            AutomationKind::MidiCc { controller: c1, .. },
            AutomationKind::MidiCc { controller: c2, .. },
        ) => c1 == c2,
        (AutomationKind::Osc { path: p1 }, AutomationKind::Osc { path: p2 }) => p1 == p2,
        _ => false,
    }
}

/// A fixed-capacity table mapping automation events to a module's control
/// ports or properties, each entry carrying an affine mapping from the
/// event's native range to the target's.
#[derive(Debug, Clone)]
pub struct AutomationTable<const N: usize> {
    mappings: [Option<MappingEntry>; N],
    count: usize,
}

impl<const N: usize> AutomationTable<N> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mappings: std::array::from_fn(|_| None),
            count: 0,
        }
    }

    /// Maps `controller` (on `channel`, or every channel when `None`) to a
    /// control port, denormalizing the incoming 0..127 CC value into
    /// `range`'s native bounds.
    pub fn map_control(
        &mut self,
        channel: Option<u8>,
        controller: u8,
        port_index: usize,
        range: ControlRange,
    ) -> bool {
        self.insert(MappingEntry {
            kind: AutomationKind::MidiCc { channel, controller },
            target: AutomationTarget::ControlPort(port_index),
            range_min: range.min,
            range_max: range.max,
            a: 0.0,
            b: 127.0,
            c: range.min,
            d: range.max,
            mul: (range.max - range.min) / 127.0,
            add: range.min,
        })
    }

    /// Maps `controller` to a property target with an explicit affine
    /// mapping, for automations that set a property rather than a control
    /// port directly.
    pub fn map_property(
        &mut self,
        channel: Option<u8>,
        controller: u8,
        urid: Urid,
        range_min: f32,
        range_max: f32,
        mul: f32,
        add: f32,
    ) -> bool {
        self.insert(MappingEntry {
            kind: AutomationKind::MidiCc { channel, controller },
            target: AutomationTarget::Property(urid),
            range_min,
            range_max,
            a: 0.0,
            b: 127.0,
            c: range_min,
            d: range_max,
            mul,
            add,
        })
    }

    fn insert(&mut self, entry: MappingEntry) -> bool {
        if let Some(existing) = self
            .mappings
            .iter_mut()
            .flatten()
            .find(|e| same_source(&e.kind, &entry.kind))
        {
            *existing = entry;
            return true;
        }
        for slot in &mut self.mappings {
            if slot.is_none() {
                *slot = Some(entry);
                self.count += 1;
                return true;
            }
        }
        false
    }

    /// Removes every mapping for `controller`, on any channel.
    pub fn unmap(&mut self, controller: u8) -> bool {
        let mut removed = false;
        for slot in &mut self.mappings {
            let hit = matches!(
                slot,
                Some(MappingEntry {
                    kind: AutomationKind::MidiCc { controller: c, .. },
                    ..
                }) if *c == controller
            );
            if hit {
                *slot = None;
                self.count -= 1;
                removed = true;
            }
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        self.mappings = std::array::from_fn(|_| None);
        self.count = 0;
    }

    /// Resolves an incoming MIDI CC event to `(target, value)`, or `None`
    /// if nothing maps it. `value` is affinely mapped and clamped per
    /// §4.10: `target_value = clamp(value * mul + add, c, d)`.
    #[must_use]
    pub fn resolve_midi_cc(&self, channel: u8, controller: u8, value: u8) -> Option<(AutomationTarget, f32)> {
        let entry = self.mappings.iter().flatten().find(|e| match &e.kind {
            AutomationKind::MidiCc {
                channel: want,
                controller: c,
            } => *c == controller && want.map_or(true, |w| w == channel),
            AutomationKind::Osc { .. } => false,
        })?;
        let resolved = (f32::from(value) * entry.mul + entry.add).clamp(entry.c, entry.d);
        Some((entry.target, resolved))
    }

    /// Every active mapping, for capturing into save/restore state.
    #[must_use]
    pub fn slots(&self) -> Vec<AutomationSlot> {
        self.mappings
            .iter()
            .flatten()
            .map(|e| AutomationSlot {
                kind: e.kind.clone(),
                target: e.target,
                range_min: e.range_min,
                range_max: e.range_max,
                a: e.a,
                b: e.b,
                c: e.c,
                d: e.d,
                mul: e.mul,
                add: e.add,
            })
            .collect()
    }

    /// Restores one mapping captured by [`AutomationTable::slots`]. Returns
    /// `false` if the table is already at capacity.
    pub fn restore_slot(&mut self, slot: AutomationSlot) -> bool {
        self.insert(MappingEntry {
            kind: slot.kind,
            target: slot.target,
            range_min: slot.range_min,
            range_max: slot.range_max,
            a: slot.a,
            b: slot.b,
            c: slot.c,
            d: slot.d,
            mul: slot.mul,
            add: slot.add,
        })
    }

    #[must_use]
    pub fn port_for_cc(&self, controller: u8) -> Option<usize> {
        self.mappings.iter().flatten().find_map(|e| match (&e.kind, e.target) {
            (AutomationKind::MidiCc { controller: c, .. }, AutomationTarget::ControlPort(idx))
                if *c == controller =>
            {
                Some(idx)
            }
            _ => None,
        })
    }
}

impl<const N: usize> Default for AutomationTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> ControlRange {
        ControlRange::new(0.0, 10.0, 0.0)
    }

    #[test]
    fn map_then_resolve_denormalizes_linearly() {
        let mut table: AutomationTable<4> = AutomationTable::new();
        assert!(table.map_control(None, 1, 0, range()));
        let (target, value) = table.resolve_midi_cc(0, 1, 127).unwrap();
        assert_eq!(target, AutomationTarget::ControlPort(0));
        assert!((value - 10.0).abs() < 1e-4);
        let (_, low) = table.resolve_midi_cc(0, 1, 0).unwrap();
        assert_eq!(low, 0.0);
    }

    #[test]
    fn wildcard_channel_matches_any_channel() {
        let mut table: AutomationTable<4> = AutomationTable::new();
        table.map_control(None, 7, 0, range());
        assert!(table.resolve_midi_cc(0, 7, 64).is_some());
        assert!(table.resolve_midi_cc(15, 7, 64).is_some());
    }

    #[test]
    fn specific_channel_ignores_other_channels() {
        let mut table: AutomationTable<4> = AutomationTable::new();
        table.map_control(Some(2), 7, 0, range());
        assert!(table.resolve_midi_cc(2, 7, 64).is_some());
        assert!(table.resolve_midi_cc(3, 7, 64).is_none());
    }

    #[test]
    fn property_target_resolves_with_explicit_affine_mapping() {
        let mut table: AutomationTable<4> = AutomationTable::new();
        table.map_property(None, 9, Urid(42), 0.0, 1.0, 1.0 / 127.0, 0.0);
        let (target, value) = table.resolve_midi_cc(0, 9, 127).unwrap();
        assert_eq!(target, AutomationTarget::Property(Urid(42)));
        assert!((value - 1.0).abs() < 1e-4);
    }

    #[test]
    fn remapping_same_controller_overwrites_in_place() {
        let mut table: AutomationTable<4> = AutomationTable::new();
        table.map_control(None, 1, 0, range());
        table.map_control(None, 1, 2, range());
        assert_eq!(table.len(), 1);
        assert_eq!(table.port_for_cc(1), Some(2));
    }

    #[test]
    fn table_rejects_mapping_past_capacity() {
        let mut table: AutomationTable<2> = AutomationTable::new();
        assert!(table.map_control(None, 1, 0, range()));
        assert!(table.map_control(None, 2, 1, range()));
        assert!(!table.map_control(None, 3, 2, range()));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn unmap_frees_a_slot() {
        let mut table: AutomationTable<1> = AutomationTable::new();
        table.map_control(None, 1, 0, range());
        assert!(table.unmap(1));
        assert!(table.is_empty());
        assert!(table.map_control(None, 2, 0, range()));
    }

    #[test]
    fn slots_round_trip_through_restore_slot() {
        let mut table: AutomationTable<4> = AutomationTable::new();
        table.map_control(Some(3), 7, 0, range());
        table.map_property(None, 9, Urid(42), 0.0, 1.0, 1.0 / 127.0, 0.0);

        let slots = table.slots();
        assert_eq!(slots.len(), 2);

        let mut restored: AutomationTable<4> = AutomationTable::new();
        for slot in slots {
            assert!(restored.restore_slot(slot));
        }
        assert_eq!(restored.len(), 2);
        assert_eq!(
            restored.resolve_midi_cc(3, 7, 127).unwrap().0,
            AutomationTarget::ControlPort(0)
        );
        assert!(restored.resolve_midi_cc(4, 7, 127).is_none());
        assert_eq!(
            restored.resolve_midi_cc(0, 9, 127).unwrap().0,
            AutomationTarget::Property(Urid(42))
        );
    }

    #[test]
    fn resolve_unknown_controller_is_none() {
        let table: AutomationTable<4> = AutomationTable::new();
        assert!(table.resolve_midi_cc(0, 5, 64).is_none());
    }
}
