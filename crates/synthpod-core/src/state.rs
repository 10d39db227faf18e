//! Logical save/restore state (§4.14), independent of any on-disk
//! encoding. `synthpod-config` turns a [`GraphState`] into TOML and back;
//! this module only defines the logical shape and how to capture one from
//! a live [`Graph`](crate::graph::Graph).
//!
//! Grid layout hints (`spod:gridCols`/`gridRows`/`paneLeft` in the
//! original protocol) round-trip as opaque integers in [`GridAttrs`] — this
//! crate has no UI, so it neither interprets nor validates them beyond
//! carrying them through save/restore.

use crate::automation::AutomationSlot;
use crate::graph::Graph;
use crate::module::ModuleId;
use crate::port::PortRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridAttrs {
    pub cols: i32,
    pub rows: i32,
    pub pane_left: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleState {
    pub uri: String,
    pub position: (i32, i32),
    pub grid: GridAttrs,
    pub bypassed: bool,
    /// `(port_index, value)` for every Control input port.
    pub controls: Vec<(usize, f32)>,
    /// Every active automation mapping, so save/restore preserves the full
    /// CC/property routing rather than just the ports' current values.
    pub automations: Vec<AutomationSlot>,
    /// `(port_index, count)` for every port with at least one UI
    /// subscriber.
    pub subscriptions: Vec<(usize, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionState {
    pub src: PortRef,
    pub dst: PortRef,
    pub gain: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphState {
    /// Indexed by position in this vector, which becomes the restored
    /// module's arena slot order (not necessarily its original `ModuleId`,
    /// since arena slots are reused — see `Graph::add_module`).
    pub modules: Vec<ModuleState>,
    pub connections: Vec<ConnectionState>,
}

impl GraphState {
    /// Captures every live module's logical state and every live
    /// connection from `graph`. Modules mid-teardown (`Lifecycle::Dying`)
    /// are excluded, matching the "never restore a half-removed module"
    /// invariant in §4.14.
    #[must_use]
    pub fn capture(graph: &Graph) -> Self {
        let mut modules = Vec::new();
        let mut connections = Vec::new();

        for id in graph.module_ids() {
            graph.with_module(id, |module| {
                if module.is_dying() {
                    return;
                }
                let controls = module
                    .control_port_indices()
                    .into_iter()
                    .filter_map(|idx| {
                        module.port(idx).and_then(|p| match p.buf {
                            crate::port::PortBuffer::Control(v) => Some((idx, v)),
                            _ => None,
                        })
                    })
                    .collect();
                let subscriptions = module
                    .ports
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.subscriptions > 0)
                    .map(|(idx, p)| (idx, p.subscriptions))
                    .collect();

                modules.push(ModuleState {
                    uri: module.uri.clone(),
                    position: module.position,
                    grid: GridAttrs::default(),
                    bypassed: module.bypassed,
                    controls,
                    automations: module.automation.slots(),
                    subscriptions,
                });

                for (port_index, port) in module.ports.iter().enumerate() {
                    for link in &port.sources {
                        connections.push(ConnectionState {
                            src: link.src,
                            dst: PortRef::new(module.id, port_index),
                            gain: link.gain,
                        });
                    }
                }
            });
        }

        Self {
            modules,
            connections,
        }
    }

    /// True if `module_id` appears as either endpoint of some connection.
    #[must_use]
    pub fn touches(&self, module_id: ModuleId) -> bool {
        self.connections
            .iter()
            .any(|c| c.src.module == module_id || c.dst.module == module_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;
    use crate::plugin::{descriptor_for, Plugin};
    use crate::port::{ControlRange, Direction, Port, PortKind};

    struct Noop;
    impl Plugin for Noop {
        fn new(_sample_rate: f64) -> Self {
            Self
        }
        fn connect_port(&mut self, _port_index: u32, _data: *mut f32) {}
        fn run(&mut self, _sample_count: u32) {}
    }

    fn module_with_control(position: (i32, i32)) -> Module {
        let ports = vec![Port::new(
            Direction::Input,
            PortKind::Control(ControlRange::new(0.0, 1.0, 0.25)),
            8,
        )];
        Module::new(
            ModuleId(0),
            "urn:test:noop".into(),
            position,
            descriptor_for::<Noop>("urn:test:noop"),
            48_000.0,
            ports,
        )
    }

    #[test]
    fn capture_records_position_and_control_values() {
        let mut graph = Graph::new(8);
        graph.add_module(module_with_control((3, 1)));
        let state = GraphState::capture(&graph);
        assert_eq!(state.modules.len(), 1);
        assert_eq!(state.modules[0].position, (3, 1));
        assert_eq!(state.modules[0].controls, vec![(0, 0.25)]);
    }

    #[test]
    fn capture_records_automation_slots_and_subscriptions() {
        let mut module = module_with_control((2, 0));
        module
            .automation
            .map_control(None, 7, 0, ControlRange::new(0.0, 1.0, 0.25));
        module.ports[0].subscribe(crate::urid::Urid(5));

        let mut graph = Graph::new(8);
        graph.add_module(module);

        let state = GraphState::capture(&graph);
        assert_eq!(state.modules[0].automations.len(), 1);
        assert_eq!(state.modules[0].subscriptions, vec![(0, 1)]);
    }

    fn module_with_audio_ports(position: (i32, i32)) -> Module {
        let ports = vec![
            Port::new(Direction::Input, PortKind::Audio, 8),
            Port::new(Direction::Output, PortKind::Audio, 8),
        ];
        Module::new(
            ModuleId(0),
            "urn:test:through".into(),
            position,
            descriptor_for::<Noop>("urn:test:through"),
            48_000.0,
            ports,
        )
    }

    #[test]
    fn capture_records_connections() {
        let mut graph = Graph::new(8);
        let a = graph.add_module(module_with_audio_ports((0, 0)));
        let b = graph.add_module(module_with_audio_ports((1, 0)));
        graph
            .connect(PortRef::new(a, 1), PortRef::new(b, 0), 0.8, 0)
            .unwrap();

        let state = GraphState::capture(&graph);
        assert_eq!(state.connections.len(), 1);
        assert_eq!(state.connections[0].src, PortRef::new(a, 1));
        assert_eq!(state.connections[0].dst, PortRef::new(b, 0));
        assert_eq!(state.connections[0].gain, 0.8);
        assert!(state.touches(a));
        assert!(!state.touches(ModuleId(99)));
    }
}
