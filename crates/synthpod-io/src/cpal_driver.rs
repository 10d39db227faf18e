//! A `cpal`-backed [`BackendDriver`] reference implementation, gated behind
//! the off-by-default `cpal-backend` feature. Concrete hardware backends
//! are an explicit Non-goal of the engine (§1) — this exists as a
//! convenience for manual exercising, not as a contractual surface the
//! rest of the workspace depends on.
//!
//! Unlike [`crate::dummy::DummyDriver`], this driver's `run_post` buffer
//! is drained by `cpal`'s own audio callback on a thread this crate does
//! not own, so the handoff between the engine's block-at-a-time push and
//! the hardware's pull-driven callback goes through a small mutex-guarded
//! queue. That queue is this driver's problem, not the RT-safety boundary
//! documented for `synthpod-core::graph` — by the time samples reach here
//! the engine has already finished its own real-time-safe block.

use std::path::Path;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use synthpod_core::urid::Urid;

use crate::driver::{
    BackendDriver, DriverInitConfig, DriverOption, SystemPortBuffer, SystemPortHandle,
    SystemPortType,
};
use crate::error::{DriverError, Result};

struct SharedQueue {
    samples: Vec<f32>,
}

pub struct CpalDriver {
    sample_rate: f64,
    block_size: u32,
    next_handle: u32,
    next_uuid: u64,
    sources: Vec<SystemPortBuffer>,
    sinks: Vec<SystemPortBuffer>,
    queue: Arc<Mutex<SharedQueue>>,
    // Kept alive for the duration of playback; dropping it stops the stream.
    _stream: Stream,
}

impl CpalDriver {
    /// Opens the system default output device and builds a stereo output
    /// stream at `cfg`'s preferred sample rate and block size.
    pub fn open_default_output(cfg: DriverInitConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(DriverError::NoDevice)?;

        let supported = device
            .default_output_config()
            .map_err(|e| DriverError::Unsupported(e.to_string()))?;

        let stream_config = StreamConfig {
            channels: supported.channels(),
            sample_rate: cpal::SampleRate(cfg.preferred_sample_rate),
            buffer_size: cpal::BufferSize::Fixed(cfg.preferred_block_size),
        };

        let queue = Arc::new(Mutex::new(SharedQueue {
            samples: Vec::new(),
        }));

        let callback_queue = queue.clone();
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    let mut queue = callback_queue.lock().unwrap();
                    let n = data.len().min(queue.samples.len());
                    data[..n].copy_from_slice(&queue.samples[..n]);
                    data[n..].fill(0.0);
                    queue.samples.drain(..n);
                },
                move |err| tracing::warn!(%err, "cpal output stream error"),
                None,
            )
            .map_err(|e| DriverError::StreamSetup(e.to_string()))?;
        stream
            .play()
            .map_err(|e| DriverError::StreamSetup(e.to_string()))?;

        Ok(Self {
            sample_rate: f64::from(cfg.preferred_sample_rate),
            block_size: cfg.preferred_block_size,
            next_handle: 0,
            next_uuid: 0,
            sources: Vec::new(),
            sinks: Vec::new(),
            queue,
            _stream: stream,
        })
    }
}

impl BackendDriver for CpalDriver {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn max_block_size(&self) -> u32 {
        self.block_size
    }

    fn system_port_add(
        &mut self,
        _port_type: SystemPortType,
        _short_name: &str,
        _is_input: bool,
    ) -> SystemPortHandle {
        let handle = SystemPortHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn system_port_del(&mut self, handle: SystemPortHandle) {
        self.sinks.retain(|s| s.sys_port != handle);
        self.sources.retain(|s| s.sys_port != handle);
    }

    fn new_uuid(&mut self) -> u64 {
        self.next_uuid += 1;
        self.next_uuid
    }

    fn run_pre(&mut self, _nsamples: u32) {}

    fn run_post(&mut self, nsamples: u32) {
        let mut queue = self.queue.lock().unwrap();
        for frame in 0..nsamples as usize {
            for sink in &self.sinks {
                queue.samples.push(sink.samples.get(frame).copied().unwrap_or(0.0));
            }
        }
    }

    fn system_sources(&self) -> &[SystemPortBuffer] {
        &self.sources
    }

    fn system_sinks(&mut self) -> &mut [SystemPortBuffer] {
        &mut self.sinks
    }

    fn options_set(&mut self, options: &[DriverOption]) {
        for option in options {
            match *option {
                DriverOption::SampleRate(rate) => self.sample_rate = rate,
                DriverOption::BlockSize(size) => self.block_size = size,
            }
        }
    }

    fn bundle_load(&mut self, _subject: Urid, _path: &Path) -> Result<()> {
        Err(DriverError::Unsupported(
            "cpal driver does not implement bundle persistence".into(),
        ))
    }

    fn bundle_save(&mut self, _subject: Urid, _path: &Path) -> Result<()> {
        Err(DriverError::Unsupported(
            "cpal driver does not implement bundle persistence".into(),
        ))
    }
}
