//! A read-only plugin discovery and metadata catalog (§1's "plugin
//! discovery/metadata catalogs" boundary).
//!
//! The engine never discovers plugins itself — something outside it (a
//! Lilv-like bundle scanner in a real host) walks installed plugin
//! descriptions and hands the engine a [`PluginDescriptor`] plus a way to
//! instantiate it. [`PluginCatalog`] is that boundary as a trait;
//! [`TestCatalog`] is an in-memory stand-in that registers a handful of
//! built-in test plugins, used by tests, `synthpod-cli`, and anywhere else
//! a real Lilv world would otherwise be required.
//!
//! # Example
//!
//! ```
//! use synthpod_registry::{PluginCatalog, TestCatalog};
//!
//! let catalog = TestCatalog::new();
//! for plugin in catalog.all_plugins() {
//!     println!("{}: {}", plugin.uri, plugin.name);
//! }
//!
//! let descriptor = catalog.instantiate("urn:synthpod:test:gain").unwrap();
//! ```

use synthpod_core::plugin::{descriptor_for, Descriptor, Plugin};
use synthpod_core::port::{ControlRange, Direction, PortKind};

/// Category of plugin for organization and filtering, mirroring the kind
/// of grouping a real plugin browser UI would want (LV2 bundles carry a
/// similar `lv2:Plugin` subclass taxonomy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginCategory {
    Generator,
    Utility,
    Filter,
    Analyzer,
}

/// A port the catalog declares a plugin will expose, in instantiation
/// order. [`synthpod_core::module::Module::new`] takes a concrete
/// `Vec<Port>` built from these templates plus the automation/event ports
/// the module synthesizes on top (§4.4).
#[derive(Debug, Clone)]
pub struct PortTemplate {
    pub direction: Direction,
    pub kind: PortKind,
}

/// Describes a plugin the catalog knows how to instantiate.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: PluginCategory,
    pub ports: Vec<PortTemplate>,
}

type PluginFactory = fn() -> Descriptor;

struct CatalogEntry {
    descriptor: PluginDescriptor,
    factory: PluginFactory,
}

/// Read-only boundary between the engine and wherever plugins are
/// actually discovered. Implementors own plugin lookup; they do not own
/// the graph or the module lifecycle — adding an instantiated plugin to a
/// running graph is the caller's job, using the `Descriptor` this trait
/// hands back.
pub trait PluginCatalog: Send + Sync {
    /// All known plugin descriptors, in registration order.
    fn all_plugins(&self) -> Vec<&PluginDescriptor>;

    /// Descriptors restricted to one category.
    fn plugins_in_category(&self, category: PluginCategory) -> Vec<&PluginDescriptor>;

    /// Looks up a plugin's metadata by URI.
    fn get(&self, uri: &str) -> Option<&PluginDescriptor>;

    /// Builds the plugin method table for `uri`. The returned
    /// [`Descriptor`]'s own `instantiate` function pointer is what takes a
    /// sample rate, when [`synthpod_core::plugin::Instance::new`] is
    /// called on it — this method only resolves *which* plugin, not at
    /// what sample rate. Returns `None` if the URI is unknown to this
    /// catalog — the caller (the module-add path) is expected to translate
    /// that into the *Unsupported* error kind (§7).
    fn instantiate(&self, uri: &str) -> Option<Descriptor>;
}

/// An in-memory [`PluginCatalog`] registering a handful of built-in test
/// plugins. Stands in for a real bundle scanner in tests, examples, and
/// `synthpod-cli`.
pub struct TestCatalog {
    entries: Vec<CatalogEntry>,
}

impl Default for TestCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCatalog {
    #[must_use]
    pub fn new() -> Self {
        let mut catalog = Self {
            entries: Vec::with_capacity(4),
        };
        catalog.register_builtin_plugins();
        catalog
    }

    fn register(&mut self, descriptor: PluginDescriptor, factory: PluginFactory) {
        self.entries.push(CatalogEntry { descriptor, factory });
    }

    fn register_builtin_plugins(&mut self) {
        self.register(
            PluginDescriptor {
                uri: "urn:synthpod:test:gain",
                name: "Test Gain",
                description: "Multiplies input by a fixed factor; used to exercise connections",
                category: PluginCategory::Utility,
                ports: vec![
                    PortTemplate { direction: Direction::Input, kind: PortKind::Audio },
                    PortTemplate { direction: Direction::Output, kind: PortKind::Audio },
                ],
            },
            || descriptor_for::<TestGain>("urn:synthpod:test:gain"),
        );

        self.register(
            PluginDescriptor {
                uri: "urn:synthpod:test:oscillator",
                name: "Test Oscillator",
                description: "Fixed-frequency sine generator; a system-source stand-in",
                category: PluginCategory::Generator,
                ports: vec![PortTemplate { direction: Direction::Output, kind: PortKind::Audio }],
            },
            || descriptor_for::<TestOscillator>("urn:synthpod:test:oscillator"),
        );

        self.register(
            PluginDescriptor {
                uri: "urn:synthpod:test:passthrough",
                name: "Test Passthrough",
                description: "Copies input to output unchanged; a system-sink stand-in",
                category: PluginCategory::Utility,
                ports: vec![
                    PortTemplate { direction: Direction::Input, kind: PortKind::Audio },
                    PortTemplate { direction: Direction::Output, kind: PortKind::Audio },
                ],
            },
            || descriptor_for::<TestPassthrough>("urn:synthpod:test:passthrough"),
        );

        self.register(
            PluginDescriptor {
                uri: "urn:synthpod:test:attenuator",
                name: "Test Attenuator",
                description: "Control-port-driven gain stage, for automation mapper tests",
                category: PluginCategory::Utility,
                ports: vec![
                    PortTemplate { direction: Direction::Input, kind: PortKind::Audio },
                    PortTemplate { direction: Direction::Output, kind: PortKind::Audio },
                    PortTemplate {
                        direction: Direction::Input,
                        kind: PortKind::Control(ControlRange::new(0.0, 1.0, 1.0)),
                    },
                ],
            },
            || descriptor_for::<TestAttenuator>("urn:synthpod:test:attenuator"),
        );
    }
}

impl PluginCatalog for TestCatalog {
    fn all_plugins(&self) -> Vec<&PluginDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    fn plugins_in_category(&self, category: PluginCategory) -> Vec<&PluginDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.category == category)
            .map(|e| &e.descriptor)
            .collect()
    }

    fn get(&self, uri: &str) -> Option<&PluginDescriptor> {
        self.entries.iter().find(|e| e.descriptor.uri == uri).map(|e| &e.descriptor)
    }

    fn instantiate(&self, uri: &str) -> Option<Descriptor> {
        self.entries
            .iter()
            .find(|e| e.descriptor.uri == uri)
            .map(|e| (e.factory)())
    }
}

struct TestGain {
    input: *const f32,
    output: *mut f32,
}

// SAFETY: same discipline as synthpod_core::plugin's own test plugins —
// ports are always connected to live buffers before `run` is invoked.
unsafe impl Send for TestGain {}

impl Plugin for TestGain {
    fn new(_sample_rate: f64) -> Self {
        Self { input: std::ptr::null(), output: std::ptr::null_mut() }
    }

    fn connect_port(&mut self, port_index: u32, data: *mut f32) {
        match port_index {
            0 => self.input = data,
            1 => self.output = data,
            _ => {}
        }
    }

    fn run(&mut self, sample_count: u32) {
        unsafe {
            for i in 0..sample_count as usize {
                *self.output.add(i) = *self.input.add(i) * 2.0;
            }
        }
    }
}

struct TestOscillator {
    phase: f32,
    step: f32,
    output: *mut f32,
}

unsafe impl Send for TestOscillator {}

impl Plugin for TestOscillator {
    fn new(sample_rate: f64) -> Self {
        Self {
            phase: 0.0,
            step: (2.0 * std::f64::consts::PI * 440.0 / sample_rate) as f32,
            output: std::ptr::null_mut(),
        }
    }

    fn connect_port(&mut self, port_index: u32, data: *mut f32) {
        if port_index == 0 {
            self.output = data;
        }
    }

    fn run(&mut self, sample_count: u32) {
        unsafe {
            for i in 0..sample_count as usize {
                *self.output.add(i) = self.phase.sin();
                self.phase += self.step;
            }
        }
    }
}

struct TestPassthrough {
    input: *const f32,
    output: *mut f32,
}

unsafe impl Send for TestPassthrough {}

impl Plugin for TestPassthrough {
    fn new(_sample_rate: f64) -> Self {
        Self { input: std::ptr::null(), output: std::ptr::null_mut() }
    }

    fn connect_port(&mut self, port_index: u32, data: *mut f32) {
        match port_index {
            0 => self.input = data,
            1 => self.output = data,
            _ => {}
        }
    }

    fn run(&mut self, sample_count: u32) {
        unsafe {
            std::ptr::copy_nonoverlapping(self.input, self.output, sample_count as usize);
        }
    }
}

struct TestAttenuator {
    input: *const f32,
    output: *mut f32,
    gain: *const f32,
}

unsafe impl Send for TestAttenuator {}

impl Plugin for TestAttenuator {
    fn new(_sample_rate: f64) -> Self {
        Self {
            input: std::ptr::null(),
            output: std::ptr::null_mut(),
            gain: std::ptr::null(),
        }
    }

    fn connect_port(&mut self, port_index: u32, data: *mut f32) {
        match port_index {
            0 => self.input = data,
            1 => self.output = data,
            2 => self.gain = data,
            _ => {}
        }
    }

    fn run(&mut self, sample_count: u32) {
        unsafe {
            let gain = *self.gain;
            for i in 0..sample_count as usize {
                *self.output.add(i) = *self.input.add(i) * gain;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_plugins_returns_every_registration() {
        let catalog = TestCatalog::new();
        assert_eq!(catalog.all_plugins().len(), 4);
    }

    #[test]
    fn get_finds_registered_uri_and_rejects_unknown() {
        let catalog = TestCatalog::new();
        assert!(catalog.get("urn:synthpod:test:gain").is_some());
        assert!(catalog.get("urn:does:not:exist").is_none());
    }

    #[test]
    fn plugins_in_category_filters_correctly() {
        let catalog = TestCatalog::new();
        let generators = catalog.plugins_in_category(PluginCategory::Generator);
        assert_eq!(generators.len(), 1);
        assert_eq!(generators[0].uri, "urn:synthpod:test:oscillator");
    }

    #[test]
    fn instantiate_unknown_uri_returns_none() {
        let catalog = TestCatalog::new();
        assert!(catalog.instantiate("urn:does:not:exist").is_none());
    }

    #[test]
    fn instantiated_gain_plugin_doubles_its_input() {
        let catalog = TestCatalog::new();
        let descriptor = catalog.instantiate("urn:synthpod:test:gain").unwrap();
        let mut instance = synthpod_core::plugin::Instance::new(descriptor, 48_000.0);

        let input = [1.0f32, 2.0, 3.0];
        let mut output = [0.0f32; 3];
        instance.connect_port(0, input.as_ptr().cast_mut());
        instance.connect_port(1, output.as_mut_ptr());
        instance.activate();
        instance.run(3);

        assert_eq!(output, [2.0, 4.0, 6.0]);
    }
}
