//! Module instances (§3 "Module", §4.4).
//!
//! A module pairs a plugin [`Instance`](crate::plugin::Instance) with its
//! port array, grid position, and automation table. The graph (see
//! [`crate::graph`]) owns an arena of these by [`ModuleId`]; a module never
//! holds a reference to another module, only `ModuleId`/[`PortRef`](crate::port::PortRef)
//! indices, per the arena-and-indices design note in §9.

use crate::automation::{AutomationTable, AutomationTarget};
use crate::plugin::{Descriptor, Instance};
use crate::port::{Port, PortBuffer, PortKind};
use crate::urid::Urid;

/// Number of simultaneous MIDI-CC automation mappings a module supports.
/// Chosen to comfortably cover a typical synth/effect's exposed control
/// ports without the table outgrowing a cache line multiple.
pub const MAX_AUTOMATION_SLOTS: usize = 16;

/// Capacity, in bytes, of a module's private automation-in/automation-out
/// queues (§4.4's synthesized automation ports). Automation-in events are
/// fixed 3-byte `(channel, controller, value)` records; automation-out
/// property events are fixed 8-byte `(urid: u32 LE, value: f32 LE)`
/// records. Both queues drain fully every block, so this only needs to
/// cover one block's worth of incoming/outgoing events.
const AUTOMATION_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Fully connected and running.
    Active,
    /// Removal requested; any live connections are ramping down before the
    /// module is dropped from the arena (§4.9).
    Dying,
}

/// One instantiated plugin and everything the runners need to drive it.
pub struct Module {
    pub id: ModuleId,
    pub uri: String,
    /// Grid position used by the graph orderer (§3 "Graph"); ascending `x`
    /// primary, ascending `y` breaks ties.
    pub position: (i32, i32),
    pub ports: Vec<Port>,
    pub automation: AutomationTable<MAX_AUTOMATION_SLOTS>,
    /// Private automation-in queue: raw `(channel, controller, value)`
    /// records appended by the host/UI, consumed and cleared every `run`.
    automation_in: Vec<u8>,
    /// Private automation-out queue: `(urid, value)` property-target
    /// automation resolved during the last `run`, for the patch layer to
    /// drain and apply.
    automation_out: Vec<u8>,
    pub bypassed: bool,
    pub lifecycle: Lifecycle,
    instance: Instance,
}

impl Module {
    #[must_use]
    pub fn new(
        id: ModuleId,
        uri: String,
        position: (i32, i32),
        descriptor: Descriptor,
        sample_rate: f64,
        ports: Vec<Port>,
    ) -> Self {
        Self {
            id,
            uri,
            position,
            ports,
            automation: AutomationTable::new(),
            automation_in: Vec::new(),
            automation_out: Vec::new(),
            bypassed: false,
            lifecycle: Lifecycle::Active,
            instance: Instance::new(descriptor, sample_rate),
        }
    }

    /// Connects every Audio/CV/Control port's buffer pointer into the
    /// plugin instance. Atom/Event ports are not part of this minimal
    /// per-sample connection ABI — they are delivered through the message
    /// plane (see [`crate::message`]) instead, matching how sequence data
    /// is host-mediated rather than pointer-shared in real LV2 hosts.
    pub fn connect_ports(&mut self) {
        for (index, port) in self.ports.iter_mut().enumerate() {
            let ptr = match &mut port.buf {
                crate::port::PortBuffer::Audio(b) | crate::port::PortBuffer::Cv(b) => {
                    b.as_mut_ptr()
                }
                crate::port::PortBuffer::Control(v) => std::ptr::from_mut(v),
                crate::port::PortBuffer::Atom(_) => continue,
            };
            self.instance.connect_port(index as u32, ptr);
        }
    }

    pub fn activate(&mut self) {
        self.instance.activate();
    }

    pub fn deactivate(&mut self) {
        self.instance.deactivate();
    }

    /// Runs the plugin for `sample_count` samples unless bypassed or dying,
    /// in which case connected ports are left untouched (the graph runner
    /// is responsible for silencing/ramping as appropriate).
    ///
    /// Automation is applied every block regardless of bypass/dying state —
    /// a bypassed module should already hold the right control values once
    /// it's switched back in (§4.6 step 2, §4.10).
    pub fn run(&mut self, sample_count: u32) {
        self.apply_automation();
        if self.bypassed || self.lifecycle == Lifecycle::Dying {
            return;
        }
        self.instance.run(sample_count);
    }

    /// Queues a MIDI CC automation event for application on the next
    /// `run`. Dropped silently if the queue is full, matching the rest of
    /// the message plane's back-pressure discipline.
    pub fn queue_automation_cc(&mut self, channel: u8, controller: u8, value: u8) {
        if self.automation_in.len() + 3 <= AUTOMATION_QUEUE_CAPACITY {
            self.automation_in.extend_from_slice(&[channel, controller, value]);
        }
    }

    /// Drains property-target automation resolved during the last `run`.
    pub fn drain_automation_out(&mut self) -> Vec<(Urid, f32)> {
        let out = self
            .automation_out
            .chunks_exact(8)
            .map(|chunk| {
                let urid = u32::from_le_bytes(chunk[0..4].try_into().unwrap());
                let value = f32::from_le_bytes(chunk[4..8].try_into().unwrap());
                (Urid(urid), value)
            })
            .collect();
        self.automation_out.clear();
        out
    }

    /// Applies every queued automation-in event to its resolved target —
    /// a control port's value, or a queued property-set event on
    /// automation-out — then clears the automation-in queue.
    fn apply_automation(&mut self) {
        for chunk in self.automation_in.chunks_exact(3) {
            let (channel, controller, value) = (chunk[0], chunk[1], chunk[2]);
            let Some((target, resolved)) = self.automation.resolve_midi_cc(channel, controller, value) else {
                continue;
            };
            match target {
                AutomationTarget::ControlPort(idx) => {
                    if let Some(port) = self.ports.get_mut(idx) {
                        let resolved = match &port.kind {
                            PortKind::Control(range) if range.integer => resolved.round(),
                            _ => resolved,
                        };
                        if let PortBuffer::Control(v) = &mut port.buf {
                            *v = resolved;
                        }
                    }
                }
                AutomationTarget::Property(urid) => {
                    if self.automation_out.len() + 8 <= AUTOMATION_QUEUE_CAPACITY {
                        self.automation_out.extend_from_slice(&urid.0.to_le_bytes());
                        self.automation_out.extend_from_slice(&resolved.to_le_bytes());
                    }
                }
            }
        }
        self.automation_in.clear();
    }

    #[must_use]
    pub fn port(&self, index: usize) -> Option<&Port> {
        self.ports.get(index)
    }

    pub fn port_mut(&mut self, index: usize) -> Option<&mut Port> {
        self.ports.get_mut(index)
    }

    #[must_use]
    pub fn control_port_indices(&self) -> Vec<usize> {
        self.ports
            .iter()
            .enumerate()
            .filter(|(_, p)| matches!(p.kind, PortKind::Control(_)))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn mark_dying(&mut self) {
        self.lifecycle = Lifecycle::Dying;
    }

    #[must_use]
    pub fn is_dying(&self) -> bool {
        self.lifecycle == Lifecycle::Dying
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{descriptor_for, Plugin};
    use crate::port::Direction;

    struct PassThrough {
        input: *const f32,
        output: *mut f32,
    }

    impl Plugin for PassThrough {
        fn new(_sample_rate: f64) -> Self {
            Self {
                input: std::ptr::null(),
                output: std::ptr::null_mut(),
            }
        }

        fn connect_port(&mut self, port_index: u32, data: *mut f32) {
            match port_index {
                0 => self.input = data,
                1 => self.output = data,
                _ => {}
            }
        }

        fn run(&mut self, sample_count: u32) {
            // SAFETY: test-only; both ports are wired to live buffers of at
            // least `sample_count` length before `run` is invoked.
            unsafe {
                for i in 0..sample_count as usize {
                    *self.output.add(i) = *self.input.add(i);
                }
            }
        }
    }

    fn make_module() -> Module {
        let ports = vec![
            Port::new(Direction::Input, PortKind::Audio, 4),
            Port::new(Direction::Output, PortKind::Audio, 4),
        ];
        let descriptor = descriptor_for::<PassThrough>("urn:test:passthrough");
        Module::new(
            ModuleId(0),
            "urn:test:passthrough".into(),
            (0, 0),
            descriptor,
            48_000.0,
            ports,
        )
    }

    #[test]
    fn connect_and_run_moves_samples_through() {
        let mut module = make_module();
        if let crate::port::PortBuffer::Audio(b) = &mut module.ports[0].buf {
            b.copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        }
        module.connect_ports();
        module.activate();
        module.run(4);
        assert_eq!(
            module.ports[1].buf.as_audio().unwrap(),
            &[1.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn bypassed_module_does_not_run() {
        let mut module = make_module();
        if let crate::port::PortBuffer::Audio(b) = &mut module.ports[0].buf {
            b.copy_from_slice(&[9.0, 9.0, 9.0, 9.0]);
        }
        module.connect_ports();
        module.bypassed = true;
        module.run(4);
        assert_eq!(
            module.ports[1].buf.as_audio().unwrap(),
            &[0.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn dying_module_is_skipped_by_run() {
        let mut module = make_module();
        module.connect_ports();
        module.mark_dying();
        assert!(module.is_dying());
        module.run(4); // must not panic or touch ports
    }

    fn make_module_with_control() -> Module {
        let ports = vec![Port::new(
            Direction::Input,
            PortKind::Control(crate::port::ControlRange::new(0.0, 10.0, 0.0)),
            8,
        )];
        let descriptor = descriptor_for::<PassThrough>("urn:test:automated");
        Module::new(
            ModuleId(0),
            "urn:test:automated".into(),
            (0, 0),
            descriptor,
            48_000.0,
            ports,
        )
    }

    #[test]
    fn queued_cc_automation_sets_control_port_on_next_run() {
        let mut module = make_module_with_control();
        module.automation.map_control(None, 7, 0, crate::port::ControlRange::new(0.0, 10.0, 0.0));
        module.queue_automation_cc(0, 7, 127);
        module.run(4);
        match module.ports[0].buf {
            PortBuffer::Control(v) => assert!((v - 10.0).abs() < 1e-4),
            _ => panic!("expected control buffer"),
        }
    }

    #[test]
    fn property_target_automation_is_drained_not_applied_to_ports() {
        let mut module = make_module_with_control();
        module
            .automation
            .map_property(None, 9, Urid(42), 0.0, 1.0, 1.0 / 127.0, 0.0);
        module.queue_automation_cc(0, 9, 127);
        module.run(4);
        match module.ports[0].buf {
            PortBuffer::Control(v) => assert_eq!(v, 0.0),
            _ => panic!("expected control buffer"),
        }
        let drained = module.drain_automation_out();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].0, Urid(42));
        assert!((drained[0].1 - 1.0).abs() < 1e-4);
        assert!(module.drain_automation_out().is_empty());
    }
}
