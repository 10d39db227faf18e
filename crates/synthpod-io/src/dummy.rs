//! An in-process, no-hardware [`BackendDriver`] used by tests and the CLI
//! in place of a real audio backend (§6 names no such driver explicitly,
//! but every production host in this shape ships one for exercising the
//! engine without a sound card — the pack's `TestCatalog`/mock-backend
//! idiom generalizes directly).

use std::collections::HashMap;
use std::path::Path;

use synthpod_core::urid::Urid;

use crate::driver::{
    BackendDriver, DriverInitConfig, DriverOption, SystemPortBuffer, SystemPortHandle,
    SystemPortType,
};
use crate::error::Result;

/// Drives the engine with silence on input and discards output, tracking
/// everything a caller might want to assert on (xrun count, registered
/// ports, last bundle path) without touching any real hardware.
pub struct DummyDriver {
    sample_rate: f64,
    block_size: u32,
    sources: Vec<SystemPortBuffer>,
    sinks: Vec<SystemPortBuffer>,
    ports: HashMap<SystemPortHandle, (SystemPortType, bool)>,
    next_handle: u32,
    next_uuid: u64,
    pub xrun_count: u64,
    pub last_bundle_load: Option<std::path::PathBuf>,
    pub last_bundle_save: Option<std::path::PathBuf>,
}

impl DummyDriver {
    #[must_use]
    pub fn new(cfg: DriverInitConfig) -> Self {
        Self {
            sample_rate: f64::from(cfg.preferred_sample_rate),
            block_size: cfg.preferred_block_size,
            sources: Vec::new(),
            sinks: Vec::new(),
            ports: HashMap::new(),
            next_handle: 0,
            next_uuid: 0,
            xrun_count: 0,
            last_bundle_load: None,
            last_bundle_save: None,
        }
    }

    /// Adds a ready-made source buffer the tests can seed with known
    /// samples before calling `run_pre`.
    pub fn add_source(&mut self, port_type: SystemPortType) -> SystemPortHandle {
        let handle = self.system_port_add(port_type, "dummy_source", true);
        self.sources
            .push(SystemPortBuffer::new(port_type, handle, self.block_size as usize));
        handle
    }

    /// Adds a sink buffer the tests can inspect after calling `run_post`.
    pub fn add_sink(&mut self, port_type: SystemPortType) -> SystemPortHandle {
        let handle = self.system_port_add(port_type, "dummy_sink", false);
        self.sinks
            .push(SystemPortBuffer::new(port_type, handle, self.block_size as usize));
        handle
    }

    pub fn source_mut(&mut self, handle: SystemPortHandle) -> Option<&mut SystemPortBuffer> {
        self.sources.iter_mut().find(|s| s.sys_port == handle)
    }
}

impl BackendDriver for DummyDriver {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn max_block_size(&self) -> u32 {
        self.block_size
    }

    fn system_port_add(
        &mut self,
        port_type: SystemPortType,
        _short_name: &str,
        is_input: bool,
    ) -> SystemPortHandle {
        let handle = SystemPortHandle(self.next_handle);
        self.next_handle += 1;
        self.ports.insert(handle, (port_type, is_input));
        handle
    }

    fn system_port_del(&mut self, handle: SystemPortHandle) {
        self.ports.remove(&handle);
        self.sources.retain(|s| s.sys_port != handle);
        self.sinks.retain(|s| s.sys_port != handle);
    }

    fn new_uuid(&mut self) -> u64 {
        self.next_uuid += 1;
        self.next_uuid
    }

    fn report_xrun(&mut self) {
        self.xrun_count += 1;
    }

    fn run_pre(&mut self, _nsamples: u32) {}

    fn run_post(&mut self, nsamples: u32) {
        for sink in &mut self.sinks {
            sink.samples[..nsamples as usize].fill(0.0);
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

    fn bundle_load(&mut self, _subject: Urid, path: &Path) -> Result<()> {
        self.last_bundle_load = Some(path.to_path_buf());
        Ok(())
    }

    fn bundle_save(&mut self, _subject: Urid, path: &Path) -> Result<()> {
        self.last_bundle_save = Some(path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_removes_system_ports() {
        let mut driver = DummyDriver::new(DriverInitConfig::default());
        let handle = driver.add_source(SystemPortType::Audio);
        assert_eq!(driver.system_sources().len(), 1);
        driver.system_port_del(handle);
        assert!(driver.system_sources().iter().all(|s| s.sys_port != handle));
    }

    #[test]
    fn run_post_clears_sinks() {
        let mut driver = DummyDriver::new(DriverInitConfig::default());
        let handle = driver.add_sink(SystemPortType::Audio);
        {
            let sink = driver
                .system_sinks()
                .iter_mut()
                .find(|s| s.sys_port == handle)
                .unwrap();
            sink.samples.fill(1.0);
        }
        driver.run_post(driver.max_block_size());
        assert!(driver.system_sinks()[0].samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn options_set_updates_sample_rate_and_block_size() {
        let mut driver = DummyDriver::new(DriverInitConfig::default());
        driver.options_set(&[DriverOption::SampleRate(44_100.0), DriverOption::BlockSize(256)]);
        assert_eq!(driver.sample_rate(), 44_100.0);
        assert_eq!(driver.max_block_size(), 256);
    }

    #[test]
    fn xrun_reports_accumulate() {
        let mut driver = DummyDriver::new(DriverInitConfig::default());
        driver.report_xrun();
        driver.report_xrun();
        assert_eq!(driver.xrun_count, 2);
    }

    #[test]
    fn new_uuid_is_monotonic_and_nonzero() {
        let mut driver = DummyDriver::new(DriverInitConfig::default());
        let a = driver.new_uuid();
        let b = driver.new_uuid();
        assert!(a > 0);
        assert!(b > a);
    }
}
