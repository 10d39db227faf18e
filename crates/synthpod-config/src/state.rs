//! TOML encoding of [`synthpod_core::state::GraphState`].
//!
//! `synthpod-core` keeps no `serde` dependency, so this module mirrors its
//! logical state shape with plain, serializable DTOs and converts between
//! the two. Decoding is fallible where the core type isn't: a bundle on
//! disk can reference a module index that doesn't exist once the modules
//! vector has been filtered or edited by hand, so connection endpoints are
//! resolved against the decoded module list and a dangling reference is
//! reported rather than silently dropped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use synthpod_core::automation::{AutomationKind, AutomationSlot, AutomationTarget};
use synthpod_core::module::ModuleId;
use synthpod_core::port::PortRef;
use synthpod_core::state::{ConnectionState, GraphState, GridAttrs, ModuleState};
use synthpod_core::urid::Urid;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AutomationKindDto {
    MidiCc { channel: Option<u8>, controller: u8 },
    Osc { path: String },
}

impl From<&AutomationKind> for AutomationKindDto {
    fn from(k: &AutomationKind) -> Self {
        match k {
            AutomationKind::MidiCc { channel, controller } => {
                AutomationKindDto::MidiCc { channel: *channel, controller: *controller }
            }
            AutomationKind::Osc { path } => AutomationKindDto::Osc { path: path.clone() },
        }
    }
}

impl From<AutomationKindDto> for AutomationKind {
    fn from(k: AutomationKindDto) -> Self {
        match k {
            AutomationKindDto::MidiCc { channel, controller } => {
                AutomationKind::MidiCc { channel, controller }
            }
            AutomationKindDto::Osc { path } => AutomationKind::Osc { path },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutomationTargetDto {
    ControlPort(usize),
    Property(u32),
}

impl From<AutomationTarget> for AutomationTargetDto {
    fn from(t: AutomationTarget) -> Self {
        match t {
            AutomationTarget::ControlPort(idx) => AutomationTargetDto::ControlPort(idx),
            AutomationTarget::Property(urid) => AutomationTargetDto::Property(urid.0),
        }
    }
}

impl From<AutomationTargetDto> for AutomationTarget {
    fn from(t: AutomationTargetDto) -> Self {
        match t {
            AutomationTargetDto::ControlPort(idx) => AutomationTarget::ControlPort(idx),
            AutomationTargetDto::Property(urid) => AutomationTarget::Property(Urid(urid)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationSlotDto {
    pub kind: AutomationKindDto,
    pub target: AutomationTargetDto,
    #[serde(default)]
    pub range_min: f32,
    #[serde(default)]
    pub range_max: f32,
    #[serde(default)]
    pub a: f32,
    #[serde(default)]
    pub b: f32,
    #[serde(default)]
    pub c: f32,
    #[serde(default)]
    pub d: f32,
    #[serde(default)]
    pub mul: f32,
    #[serde(default)]
    pub add: f32,
}

impl From<&AutomationSlot> for AutomationSlotDto {
    fn from(s: &AutomationSlot) -> Self {
        Self {
            kind: (&s.kind).into(),
            target: s.target.into(),
            range_min: s.range_min,
            range_max: s.range_max,
            a: s.a,
            b: s.b,
            c: s.c,
            d: s.d,
            mul: s.mul,
            add: s.add,
        }
    }
}

impl From<AutomationSlotDto> for AutomationSlot {
    fn from(s: AutomationSlotDto) -> Self {
        Self {
            kind: s.kind.into(),
            target: s.target.into(),
            range_min: s.range_min,
            range_max: s.range_max,
            a: s.a,
            b: s.b,
            c: s.c,
            d: s.d,
            mul: s.mul,
            add: s.add,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GridAttrsDto {
    #[serde(default)]
    pub cols: i32,
    #[serde(default)]
    pub rows: i32,
    #[serde(default)]
    pub pane_left: i32,
}

impl From<GridAttrs> for GridAttrsDto {
    fn from(g: GridAttrs) -> Self {
        Self { cols: g.cols, rows: g.rows, pane_left: g.pane_left }
    }
}

impl From<GridAttrsDto> for GridAttrs {
    fn from(g: GridAttrsDto) -> Self {
        Self { cols: g.cols, rows: g.rows, pane_left: g.pane_left }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleStateDto {
    pub uri: String,
    pub position: (i32, i32),
    #[serde(default)]
    pub grid: GridAttrsDto,
    #[serde(default)]
    pub bypassed: bool,
    #[serde(default)]
    pub controls: Vec<(usize, f32)>,
    #[serde(default)]
    pub automations: Vec<AutomationSlotDto>,
    #[serde(default)]
    pub subscriptions: Vec<(usize, u32)>,
}

impl From<&ModuleState> for ModuleStateDto {
    fn from(m: &ModuleState) -> Self {
        Self {
            uri: m.uri.clone(),
            position: m.position,
            grid: m.grid.into(),
            bypassed: m.bypassed,
            controls: m.controls.clone(),
            automations: m.automations.iter().map(AutomationSlotDto::from).collect(),
            subscriptions: m.subscriptions.clone(),
        }
    }
}

impl From<ModuleStateDto> for ModuleState {
    fn from(m: ModuleStateDto) -> Self {
        Self {
            uri: m.uri,
            position: m.position,
            grid: m.grid.into(),
            bypassed: m.bypassed,
            controls: m.controls,
            automations: m.automations.into_iter().map(AutomationSlot::from).collect(),
            subscriptions: m.subscriptions,
        }
    }
}

/// A connection endpoint, serialized as a plain module index rather than
/// a [`PortRef`], since `PortRef`'s `ModuleId` is only meaningful within a
/// live graph's arena slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRefDto {
    pub module: usize,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStateDto {
    pub src: PortRefDto,
    pub dst: PortRefDto,
    #[serde(default = "default_gain")]
    pub gain: f32,
}

fn default_gain() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphStateDto {
    #[serde(default)]
    pub modules: Vec<ModuleStateDto>,
    #[serde(default)]
    pub connections: Vec<ConnectionStateDto>,
}

impl From<&GraphState> for GraphStateDto {
    fn from(state: &GraphState) -> Self {
        Self {
            modules: state.modules.iter().map(ModuleStateDto::from).collect(),
            connections: state
                .connections
                .iter()
                .map(|c| ConnectionStateDto {
                    src: PortRefDto { module: c.src.module.0, index: c.src.index },
                    dst: PortRefDto { module: c.dst.module.0, index: c.dst.index },
                    gain: c.gain,
                })
                .collect(),
        }
    }
}

impl TryFrom<GraphStateDto> for GraphState {
    type Error = ConfigError;

    fn try_from(dto: GraphStateDto) -> Result<Self, Self::Error> {
        let module_count = dto.modules.len();
        let modules = dto.modules.into_iter().map(ModuleState::from).collect();

        let mut connections = Vec::with_capacity(dto.connections.len());
        for c in dto.connections {
            if c.src.module >= module_count {
                return Err(ConfigError::DanglingModuleRef(c.src.module));
            }
            if c.dst.module >= module_count {
                return Err(ConfigError::DanglingModuleRef(c.dst.module));
            }
            connections.push(ConnectionState {
                src: PortRef::new(ModuleId(c.src.module), c.src.index),
                dst: PortRef::new(ModuleId(c.dst.module), c.dst.index),
                gain: c.gain,
            });
        }

        Ok(GraphState { modules, connections })
    }
}

/// Serializes `state` to TOML.
pub fn to_toml(state: &GraphState) -> Result<String, ConfigError> {
    let dto = GraphStateDto::from(state);
    toml::to_string_pretty(&dto).map_err(ConfigError::from)
}

/// Parses a [`GraphState`] from TOML text, rejecting dangling connection
/// endpoints.
pub fn from_toml(text: &str) -> Result<GraphState, ConfigError> {
    let dto: GraphStateDto = toml::from_str(text)?;
    GraphState::try_from(dto)
}

/// Loads a bundle's graph state from `path`.
pub fn load(path: impl AsRef<Path>) -> Result<GraphState, ConfigError> {
    let path = path.as_ref();
    let text =
        std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    from_toml(&text)
}

/// Saves `state` to `path` as TOML, creating parent directories as needed.
pub fn save(state: &GraphState, path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }
    let text = to_toml(state)?;
    std::fs::write(path, text).map_err(|e| ConfigError::write_file(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_state() -> GraphState {
        GraphState {
            modules: vec![
                ModuleState {
                    uri: "urn:synthpod:test:oscillator".into(),
                    position: (0, 0),
                    grid: GridAttrs { cols: 4, rows: 2, pane_left: 0 },
                    bypassed: false,
                    controls: vec![],
                    automations: vec![],
                    subscriptions: vec![],
                },
                ModuleState {
                    uri: "urn:synthpod:test:attenuator".into(),
                    position: (1, 0),
                    grid: GridAttrs::default(),
                    bypassed: false,
                    controls: vec![(2, 0.5)],
                    automations: vec![AutomationSlot {
                        kind: AutomationKind::MidiCc { channel: None, controller: 7 },
                        target: AutomationTarget::ControlPort(2),
                        range_min: 0.0,
                        range_max: 1.0,
                        a: 0.0,
                        b: 127.0,
                        c: 0.0,
                        d: 1.0,
                        mul: 1.0 / 127.0,
                        add: 0.0,
                    }],
                    subscriptions: vec![(2, 1)],
                },
            ],
            connections: vec![ConnectionState {
                src: PortRef::new(ModuleId(0), 0),
                dst: PortRef::new(ModuleId(1), 0),
                gain: 0.9,
            }],
        }
    }

    #[test]
    fn round_trips_through_toml() {
        let state = sample_state();
        let text = to_toml(&state).unwrap();
        let restored = from_toml(&text).unwrap();
        assert_eq!(restored.modules.len(), 2);
        assert_eq!(restored.modules[1].controls, vec![(2, 0.5)]);
        assert_eq!(restored.modules[1].automations.len(), 1);
        assert_eq!(restored.modules[1].subscriptions, vec![(2, 1)]);
        assert_eq!(restored.connections.len(), 1);
        assert_eq!(restored.connections[0].gain, 0.9);
    }

    #[test]
    fn connection_to_unknown_module_is_rejected() {
        let dto = GraphStateDto {
            modules: vec![ModuleStateDto {
                uri: "urn:synthpod:test:gain".into(),
                position: (0, 0),
                grid: GridAttrsDto::default(),
                bypassed: false,
                controls: vec![],
                automations: vec![],
                subscriptions: vec![],
            }],
            connections: vec![ConnectionStateDto {
                src: PortRefDto { module: 0, index: 0 },
                dst: PortRefDto { module: 5, index: 0 },
                gain: 1.0,
            }],
        };
        let toml_text = toml::to_string(&dto).unwrap();
        let err = from_toml(&toml_text).unwrap_err();
        assert!(matches!(err, ConfigError::DanglingModuleRef(5)));
    }

    #[test]
    fn save_then_load_round_trips_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.toml");
        let state = sample_state();

        save(&state, &path).unwrap();
        let restored = load(&path).unwrap();

        assert_eq!(restored.modules.len(), state.modules.len());
        assert_eq!(restored.connections.len(), state.connections.len());
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("session.toml");
        save(&sample_state(), &path).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn load_missing_file_is_a_read_error() {
        let err = load("/nonexistent/path/session_12345.toml").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
