//! The module graph and its two runners (§3 "Graph", §4.5, §9).
//!
//! Execution order is a pure function of each module's `(x, y)` grid
//! position — ascending `x` primary, ascending `y` breaking ties — never a
//! topological sort of the connection graph. A connection whose source sits
//! later in that order than its sink is legal and simply reads last
//! block's output, giving the host a deterministic one-block feedback path
//! instead of a wiring error.
//!
//! Port buffers are persistent, module-owned storage, not transient
//! per-block virtual registers: unlike a from-scratch compiler over a DAG,
//! there is no buffer-liveness analysis or register allocation to perform
//! at "compile" time, so rebuilding the order after a topology edit is just
//! a sort, not a scheduling pass.
//!
//! Each arena slot is its own `Mutex<Option<Module>>` so [`Graph::run_parallel`]
//! can hand different slots to different worker threads through safe Rust
//! rather than raw pointers. [`Graph::run_serial`] takes the same locks,
//! uncontended, so both runners share one multiplexing path.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::GraphError;
use crate::module::{Module, ModuleId};
use crate::port::{Direction, PortBuffer, PortRef};

/// Per-module run-time accounting for one reporting window (§11 "CPU load
/// accounting", exposed via `spod:moduleProfiling`/`spod:dspProfiling`).
/// Reset by [`Graph::reset_timings`]; accumulated by both runners on every
/// call to [`Module::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModuleTiming {
    pub min: Duration,
    pub max: Duration,
    pub sum: Duration,
    pub count: u32,
}

impl ModuleTiming {
    fn record(&mut self, elapsed: Duration) {
        self.min = if self.count == 0 { elapsed } else { self.min.min(elapsed) };
        self.max = self.max.max(elapsed);
        self.sum += elapsed;
        self.count += 1;
    }

    #[must_use]
    pub fn avg(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.sum / self.count
        }
    }
}

/// Which multiplexing path an input port needs, keyed off its buffer type.
enum InputKind {
    Audio,
    Control,
    Atom,
}

pub struct Graph {
    modules: Vec<Mutex<Option<Module>>>,
    order: Vec<ModuleId>,
    order_dirty: bool,
    max_block: usize,
    timings: Vec<Mutex<ModuleTiming>>,
}

impl Graph {
    #[must_use]
    pub fn new(max_block: usize) -> Self {
        Self {
            modules: Vec::new(),
            order: Vec::new(),
            order_dirty: false,
            max_block,
            timings: Vec::new(),
        }
    }

    fn ensure_timing_slot(&mut self, id: ModuleId) {
        if self.timings.len() <= id.0 {
            self.timings.resize_with(id.0 + 1, || Mutex::new(ModuleTiming::default()));
        }
    }

    /// Current accounting window for `id`, or `None` if it has never run.
    #[must_use]
    pub fn timing_of(&self, id: ModuleId) -> Option<ModuleTiming> {
        self.timings.get(id.0).map(|t| *t.lock().unwrap())
    }

    /// Clears every module's accounting, starting a new reporting window.
    pub fn reset_timings(&mut self) {
        for t in &self.timings {
            *t.lock().unwrap() = ModuleTiming::default();
        }
    }

    #[must_use]
    pub fn max_block(&self) -> usize {
        self.max_block
    }

    /// Inserts `module`, reusing a freed arena slot if one exists.
    pub fn add_module(&mut self, mut module: Module) -> ModuleId {
        module.connect_ports();
        module.activate();
        let id = if let Some(slot) = self
            .modules
            .iter()
            .position(|m| m.lock().unwrap().is_none())
        {
            module.id = ModuleId(slot);
            *self.modules[slot].lock().unwrap() = Some(module);
            ModuleId(slot)
        } else {
            let id = ModuleId(self.modules.len());
            module.id = id;
            self.modules.push(Mutex::new(Some(module)));
            id
        };
        self.ensure_timing_slot(id);
        self.order_dirty = true;
        tracing::debug!(module = id.0, "module added to graph");
        id
    }

    /// Marks a module as dying; the caller is responsible for ramping down
    /// any live connections before calling [`Graph::remove_module`] (§4.9).
    pub fn begin_remove(&mut self, id: ModuleId) -> Result<(), GraphError> {
        let mut slot = self
            .modules
            .get(id.0)
            .ok_or(GraphError::ModuleNotFound)?
            .lock()
            .unwrap();
        slot.as_mut().ok_or(GraphError::ModuleNotFound)?.mark_dying();
        Ok(())
    }

    /// Drops a module from the arena and clears any dangling source links
    /// that pointed at it. Should only be called once its connections have
    /// finished ramping down.
    pub fn remove_module(&mut self, id: ModuleId) -> Result<(), GraphError> {
        let mut module = {
            let mut slot = self
                .modules
                .get(id.0)
                .ok_or(GraphError::ModuleNotFound)?
                .lock()
                .unwrap();
            slot.take().ok_or(GraphError::ModuleNotFound)?
        };
        module.deactivate();
        for other in &self.modules {
            if let Some(m) = other.lock().unwrap().as_mut() {
                for port in &mut m.ports {
                    port.sources.retain(|link| link.src.module != id);
                }
            }
        }
        self.order_dirty = true;
        tracing::debug!(module = id.0, "module removed from graph");
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, id: ModuleId) -> bool {
        self.modules
            .get(id.0)
            .is_some_and(|m| m.lock().unwrap().is_some())
    }

    #[must_use]
    pub fn uri_of(&self, id: ModuleId) -> Option<String> {
        self.modules
            .get(id.0)?
            .lock()
            .unwrap()
            .as_ref()
            .map(|m| m.uri.clone())
    }

    /// Ids of every live module, in arena order (not execution order — see
    /// [`Graph::run_serial`] for that).
    #[must_use]
    pub fn module_ids(&self) -> Vec<ModuleId> {
        self.modules
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.lock().unwrap().is_some().then_some(ModuleId(i)))
            .collect()
    }

    /// Runs `f` against module `id` while its lock is held, for read-only
    /// inspection (state capture, UI queries). Returns `None` if the slot
    /// is empty.
    pub fn with_module<R>(&self, id: ModuleId, f: impl FnOnce(&Module) -> R) -> Option<R> {
        self.modules.get(id.0)?.lock().unwrap().as_ref().map(f)
    }

    /// Connects `src` (must be an output port) to `dst` (must be an input
    /// port) with the given mix gain, fading in over `ramp_samples`.
    pub fn connect(
        &mut self,
        src: PortRef,
        dst: PortRef,
        gain: f32,
        ramp_samples: u32,
    ) -> Result<(), GraphError> {
        {
            let src_slot = self
                .modules
                .get(src.module.0)
                .ok_or(GraphError::ModuleNotFound)?
                .lock()
                .unwrap();
            let src_module = src_slot.as_ref().ok_or(GraphError::ModuleNotFound)?;
            let src_port = src_module
                .port(src.index)
                .ok_or(GraphError::PortNotFound(src))?;
            if src_port.direction != Direction::Output {
                return Err(GraphError::DirectionMismatch);
            }
        }
        let mut dst_slot = self
            .modules
            .get(dst.module.0)
            .ok_or(GraphError::ModuleNotFound)?
            .lock()
            .unwrap();
        let dst_module = dst_slot.as_mut().ok_or(GraphError::ModuleNotFound)?;
        let dst_port = dst_module
            .port_mut(dst.index)
            .ok_or(GraphError::PortNotFound(dst))?;
        if dst_port.direction != Direction::Input {
            return Err(GraphError::DirectionMismatch);
        }
        if dst_port.sources.iter().any(|link| link.src == src) {
            return Err(GraphError::AlreadyConnected);
        }
        let mut ramp = crate::ramp::Ramp::settled_off();
        ramp.start_up(ramp_samples);
        dst_port.sources.push(crate::port::SourceLink { src, gain, ramp });
        Ok(())
    }

    /// Begins ramping out the connection `src -> dst`. The link is only
    /// actually removed from the port once its ramp reports
    /// [`crate::ramp::Ramp::is_removable`] (drained by
    /// [`Graph::reap_removable_links`]).
    pub fn disconnect(
        &mut self,
        src: PortRef,
        dst: PortRef,
        ramp_samples: u32,
    ) -> Result<(), GraphError> {
        let mut dst_slot = self
            .modules
            .get(dst.module.0)
            .ok_or(GraphError::ModuleNotFound)?
            .lock()
            .unwrap();
        let dst_module = dst_slot.as_mut().ok_or(GraphError::ModuleNotFound)?;
        let dst_port = dst_module
            .port_mut(dst.index)
            .ok_or(GraphError::PortNotFound(dst))?;
        let link = dst_port
            .sources
            .iter_mut()
            .find(|link| link.src == src)
            .ok_or(GraphError::NotConnected)?;
        link.ramp.start_down(ramp_samples);
        Ok(())
    }

    /// Drops any source links whose down-ramp has fully completed. Call
    /// once per block after running, so a disconnect's fade-out always
    /// gets exactly one full ramp's worth of audio before the link
    /// disappears.
    pub fn reap_removable_links(&mut self) {
        for slot in &self.modules {
            if let Some(module) = slot.lock().unwrap().as_mut() {
                for port in &mut module.ports {
                    port.sources.retain(|link| !link.ramp.is_removable());
                }
            }
        }
    }

    fn rebuild_order(&mut self) {
        let mut order: Vec<(ModuleId, (i32, i32))> = self
            .modules
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.lock().unwrap().as_ref().map(|m| (ModuleId(i), m.position)))
            .collect();
        order.sort_by_key(|(_, pos)| *pos);
        self.order = order.into_iter().map(|(id, _)| id).collect();
        self.order_dirty = false;
    }

    fn ensure_order(&mut self) {
        if self.order_dirty {
            self.rebuild_order();
        }
    }

    /// Multiplexes one audio/CV input port: silence if it has no sources, a
    /// direct ramped copy for exactly one, or a ramped sum for more than
    /// one (§3 invariant 3, §4.3). Locks each source module only for the
    /// duration of copying its current buffer out.
    fn multiplex_input(&self, dst: ModuleId, port_index: usize, n: usize, scratch: &mut [f32]) {
        let links = {
            let slot = self.modules[dst.0].lock().unwrap();
            slot.as_ref().unwrap().ports[port_index].sources.clone()
        };

        let mut dst_slot = self.modules[dst.0].lock().unwrap();
        let dst_module = dst_slot.as_mut().unwrap();
        let Some(out) = dst_module.ports[port_index].buf.as_audio_mut() else {
            return;
        };
        out[..n].iter_mut().for_each(|s| *s = 0.0);
        drop(dst_slot);

        for link in links {
            {
                let src_slot = self.modules[link.src.module.0].lock().unwrap();
                let Some(src_module) = src_slot.as_ref() else {
                    continue;
                };
                let Some(src_buf) = src_module.ports[link.src.index].buf.as_audio() else {
                    continue;
                };
                scratch[..n].copy_from_slice(&src_buf[..n]);
            }

            let mut ramp = link.ramp;
            let mut dst_slot = self.modules[dst.0].lock().unwrap();
            let dst_module = dst_slot.as_mut().unwrap();
            let out = dst_module.ports[port_index].buf.as_audio_mut().unwrap();
            for i in 0..n {
                let g = ramp.next_sample() * link.gain;
                out[i] += scratch[i] * g;
            }
            dst_module.ports[port_index]
                .sources
                .iter_mut()
                .find(|l| l.src == link.src)
                .unwrap()
                .ramp = ramp;
        }
    }

    /// Control inputs take the value of the most-recently-connected source
    /// each block (§4.3 "select the last-written source"). Unlike audio,
    /// control values are stepped rather than ramped here — a module's own
    /// smoothing, if any, is its business.
    fn multiplex_control_input(&self, dst: ModuleId, port_index: usize) {
        let links = {
            let slot = self.modules[dst.0].lock().unwrap();
            slot.as_ref().unwrap().ports[port_index].sources.clone()
        };
        let Some(link) = links.last() else { return };
        let value = {
            let src_slot = self.modules[link.src.module.0].lock().unwrap();
            let Some(src_module) = src_slot.as_ref() else {
                return;
            };
            match src_module.ports[link.src.index].buf {
                PortBuffer::Control(v) => v,
                _ => return,
            }
        };
        let mut dst_slot = self.modules[dst.0].lock().unwrap();
        if let PortBuffer::Control(v) = &mut dst_slot.as_mut().unwrap().ports[port_index].buf {
            *v = value;
        }
    }

    /// Atom Sequence inputs are time-merged by concatenating every
    /// connected source's current sequence bytes in connection order,
    /// truncated to the port's declared capacity (§4.6).
    fn multiplex_atom_input(&self, dst: ModuleId, port_index: usize) {
        let links = {
            let slot = self.modules[dst.0].lock().unwrap();
            slot.as_ref().unwrap().ports[port_index].sources.clone()
        };

        let mut merged = Vec::new();
        for link in &links {
            let src_slot = self.modules[link.src.module.0].lock().unwrap();
            let Some(src_module) = src_slot.as_ref() else {
                continue;
            };
            if let PortBuffer::Atom(bytes) = &src_module.ports[link.src.index].buf {
                merged.extend_from_slice(bytes);
            }
        }

        let mut dst_slot = self.modules[dst.0].lock().unwrap();
        if let PortBuffer::Atom(buf) = &mut dst_slot.as_mut().unwrap().ports[port_index].buf {
            buf.fill(0);
            let len = merged.len().min(buf.len());
            buf[..len].copy_from_slice(&merged[..len]);
        }
    }

    fn multiplex_all_inputs(&self, id: ModuleId, n: usize, scratch: &mut [f32]) {
        let port_count = { self.modules[id.0].lock().unwrap().as_ref().unwrap().ports.len() };
        for p in 0..port_count {
            let kind = {
                let slot = self.modules[id.0].lock().unwrap();
                let port = &slot.as_ref().unwrap().ports[p];
                (port.direction == Direction::Input).then(|| match port.buf {
                    PortBuffer::Audio(_) | PortBuffer::Cv(_) => InputKind::Audio,
                    PortBuffer::Control(_) => InputKind::Control,
                    PortBuffer::Atom(_) => InputKind::Atom,
                })
            };
            match kind {
                Some(InputKind::Audio) => self.multiplex_input(id, p, n, scratch),
                Some(InputKind::Control) => self.multiplex_control_input(id, p),
                Some(InputKind::Atom) => self.multiplex_atom_input(id, p),
                None => {}
            }
        }
    }

    /// Runs every live, non-dying module in position order on the calling
    /// thread.
    pub fn run_serial(&mut self, n: usize) {
        self.ensure_order();
        let order = self.order.clone();
        let mut scratch = vec![0.0f32; n.max(self.max_block)];
        for id in order {
            let dying = {
                let slot = self.modules[id.0].lock().unwrap();
                slot.as_ref().map_or(true, Module::is_dying)
            };
            if dying {
                continue;
            }
            self.multiplex_all_inputs(id, n, &mut scratch);
            let start = Instant::now();
            self.modules[id.0]
                .lock()
                .unwrap()
                .as_mut()
                .unwrap()
                .run(n as u32);
            if let Some(t) = self.timings.get(id.0) {
                t.lock().unwrap().record(start.elapsed());
            }
        }
        self.reap_removable_links();
    }

    /// Runs live modules across `worker_count` threads. Each module is
    /// gated behind an atomic countdown of how many earlier-position
    /// modules have not yet finished this block, so it always produces the
    /// same result as [`Graph::run_serial`] (§8 "serial/parallel
    /// equivalence").
    ///
    /// TODO: derive the dependency count from actual connections instead
    /// of full position order, so independent chains can overlap instead
    /// of fully serializing through the ready queue.
    pub fn run_parallel(&mut self, n: usize, worker_count: usize) {
        self.ensure_order();
        let order = self.order.clone();
        let total = order.len();
        if total == 0 {
            return;
        }

        let remaining: Vec<AtomicUsize> = (0..total)
            .map(|idx| AtomicUsize::new(if idx == 0 { 0 } else { 1 }))
            .collect();
        let ready: Mutex<VecDeque<usize>> = Mutex::new(VecDeque::from([0usize]));
        let done_count = AtomicUsize::new(0);
        let cvar = Condvar::new();
        let this = &*self;

        std::thread::scope(|scope| {
            for _ in 0..worker_count.max(1) {
                let ready = &ready;
                let remaining = &remaining;
                let done_count = &done_count;
                let cvar = &cvar;
                let order = &order;
                scope.spawn(move || {
                    let mut scratch = vec![0.0f32; n.max(this.max_block)];
                    loop {
                        let next = {
                            let mut queue = ready.lock().unwrap();
                            loop {
                                if let Some(idx) = queue.pop_front() {
                                    break Some(idx);
                                }
                                if done_count.load(Ordering::Acquire) == total {
                                    break None;
                                }
                                queue = cvar.wait(queue).unwrap();
                            }
                        };
                        let Some(idx) = next else { break };

                        let id = order[idx];
                        let dying = {
                            let slot = this.modules[id.0].lock().unwrap();
                            slot.as_ref().map_or(true, Module::is_dying)
                        };
                        if !dying {
                            this.multiplex_all_inputs(id, n, &mut scratch);
                            let start = Instant::now();
                            this.modules[id.0]
                                .lock()
                                .unwrap()
                                .as_mut()
                                .unwrap()
                                .run(n as u32);
                            if let Some(t) = this.timings.get(id.0) {
                                t.lock().unwrap().record(start.elapsed());
                            }
                        }

                        done_count.fetch_add(1, Ordering::AcqRel);
                        if idx + 1 < total
                            && remaining[idx + 1].fetch_sub(1, Ordering::AcqRel) == 1
                        {
                            ready.lock().unwrap().push_back(idx + 1);
                        }
                        cvar.notify_all();
                    }
                });
            }
        });

        self.reap_removable_links();
    }

    #[cfg(test)]
    fn port_audio(&self, id: ModuleId, index: usize) -> Vec<f32> {
        self.modules[id.0].lock().unwrap().as_ref().unwrap().ports[index]
            .buf
            .as_audio()
            .unwrap()
            .to_vec()
    }

    #[cfg(test)]
    fn set_port_audio(&self, id: ModuleId, index: usize, values: &[f32]) {
        let mut slot = self.modules[id.0].lock().unwrap();
        if let PortBuffer::Audio(buf) =
            &mut slot.as_mut().unwrap().ports[index].buf
        {
            buf[..values.len()].copy_from_slice(values);
        }
    }
}
