//! The backend driver contract (§6).
//!
//! A real host is driven by some external backend (JACK, ALSA, a DAW's
//! plugin-host shell, a dummy in-process harness for tests) that owns the
//! audio thread and calls into the engine once per block. The C original
//! expresses this as two structs of function pointers passed across the
//! boundary in opposite directions: the engine's own entry points (`new`,
//! `run_pre`/`run_post`, `get_system_sources`/`sinks`, ...) that the backend
//! calls, and a callback struct (`sample_rate`, `system_port_add`, `map`,
//! ...) that the engine calls back into the backend with.
//!
//! Rust has no separate "caller" and "callee" structs for this — a single
//! object-safe trait plays both roles, the way [`AudioBackend`] does in the
//! wider example pack: [`BackendDriver`] is implemented once per concrete
//! backend and used both to drive the engine each block and to answer the
//! engine's questions about hardware capabilities and port registration.
//!
//! [`AudioBackend`]: https://docs.rs/cpal (conceptually; no direct reuse)

use synthpod_core::urid::Urid;

/// Typed kind of a system-facing (hardware-side) port, distinct from
/// [`synthpod_core::port::PortKind`] — a system port is a raw interleaved
/// buffer the backend fills or drains each block, before the engine's own
/// graph of [`synthpod_core::module::Module`] ports ever sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemPortType {
    Audio,
    Cv,
    Midi,
}

/// Opaque handle to a registered system port, scoped to the driver that
/// issued it. Stable for the lifetime of the port; reused only after
/// `system_port_del`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemPortHandle(pub u32);

/// A typed buffer the backend copies audio into (source) or out of (sink)
/// around each block, per §6's `get_system_sources`/`get_system_sinks`.
#[derive(Debug, Clone)]
pub struct SystemPortBuffer {
    pub port_type: SystemPortType,
    pub sys_port: SystemPortHandle,
    pub samples: Vec<f32>,
}

impl SystemPortBuffer {
    #[must_use]
    pub fn new(port_type: SystemPortType, sys_port: SystemPortHandle, block_len: usize) -> Self {
        Self {
            port_type,
            sys_port,
            samples: vec![0.0; block_len],
        }
    }
}

/// Block-size / sample-rate change propagated from the host's negotiation
/// with the hardware down into the engine (§6's `options_set`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriverOption {
    SampleRate(f64),
    BlockSize(u32),
}

/// Parameters used to stand the driver up, distinct from
/// `synthpod_config::DriverConfig` (§10.4), which covers the *engine's*
/// resource knobs (worker threads, sparse-update timeout, ramp duration)
/// rather than the hardware-facing preferences a concrete backend opens a
/// stream with.
#[derive(Debug, Clone, Copy)]
pub struct DriverInitConfig {
    pub preferred_sample_rate: u32,
    pub preferred_block_size: u32,
}

impl Default for DriverInitConfig {
    fn default() -> Self {
        Self {
            preferred_sample_rate: 48_000,
            preferred_block_size: 512,
        }
    }
}

/// The backend driver contract (§6): the surface a backend calls into the
/// engine with each block, and the surface the engine calls back into the
/// backend with to learn its capabilities and register system ports.
///
/// Implementors are not required to be real-time safe internally — a
/// concrete hardware backend (e.g. the optional `cpal` driver) does its own
/// blocking device I/O off this trait's methods on whatever thread the
/// hardware API calls back on. What this trait guarantees to the engine is
/// only the *shape* of the per-block exchange.
pub trait BackendDriver: Send {
    /// The driver's own preferred sample rate, queried once at startup and
    /// on every `options_set` renegotiation.
    fn sample_rate(&self) -> f64;

    /// Largest block length this driver will ever request in one call.
    fn max_block_size(&self) -> u32;

    /// Smallest block length this driver will ever request in one call.
    /// Most drivers run a fixed block size, in which case this equals
    /// [`BackendDriver::max_block_size`].
    fn min_block_size(&self) -> u32 {
        self.max_block_size()
    }

    /// Capacity, in bytes, the driver recommends for Atom Sequence ports
    /// it feeds (MIDI, OSC). Engine ports may still request more.
    fn seq_size(&self) -> u32 {
        8192
    }

    /// Sparse-update reporting rate, in Hz (§4.6's default is 1/25s).
    fn update_rate(&self) -> f32 {
        25.0
    }

    /// Number of module worker threads this driver recommends for the
    /// parallel runner; `0` asks for the serial runner.
    fn num_slaves(&self) -> usize {
        0
    }

    /// Plugin URIs this driver's environment is known to mishandle (the
    /// C original calls this `bad_plugins`; kept so a driver can veto
    /// instantiation of modules it knows will misbehave on its hardware).
    fn bad_plugins(&self) -> &[String] {
        &[]
    }

    /// Registers a new system-facing port and returns its handle.
    fn system_port_add(
        &mut self,
        port_type: SystemPortType,
        short_name: &str,
        is_input: bool,
    ) -> SystemPortHandle;

    /// Unregisters a previously added system port. A no-op if the handle
    /// is unknown (already removed).
    fn system_port_del(&mut self, handle: SystemPortHandle);

    /// Allocates a fresh URID-scoped UUID for plugin-to-plugin or
    /// plugin-to-session identification (the C original's `xmap.new_uuid`).
    fn new_uuid(&mut self) -> u64;

    /// Called once per backend-reported buffer underrun, purely for
    /// bookkeeping (§11) — never affects RT-thread control flow.
    fn report_xrun(&mut self) {}

    /// Invoked before the backend's own per-block I/O copy.
    fn run_pre(&mut self, nsamples: u32);

    /// Invoked after the backend's own per-block I/O copy.
    fn run_post(&mut self, nsamples: u32);

    /// Buffers the backend fills with captured hardware input before each
    /// block (empty if this driver has no input sources).
    fn system_sources(&self) -> &[SystemPortBuffer];

    /// Buffers the backend drains to hardware output after each block.
    fn system_sinks(&mut self) -> &mut [SystemPortBuffer];

    /// Propagates a block-size or sample-rate renegotiation.
    fn options_set(&mut self, options: &[DriverOption]);

    /// Rounds a requested block length to whatever this driver can
    /// actually deliver (e.g. a fixed hardware period size).
    fn nominal_block_length(&self, n: u32) -> u32 {
        n
    }

    /// Begins an async bundle load, identified by `subject`. Real
    /// completion is reported asynchronously through the message plane
    /// (§4.8), not as this call's return value — this method only starts
    /// the job.
    fn bundle_load(&mut self, subject: Urid, path: &std::path::Path) -> crate::error::Result<()>;

    /// Begins an async bundle save; see [`BackendDriver::bundle_load`].
    fn bundle_save(&mut self, subject: Urid, path: &std::path::Path) -> crate::error::Result<()>;
}
