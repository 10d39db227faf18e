//! Worker threads for off-RT-thread plugin work (§4.12).
//!
//! A module whose plugin declares a worker interface gets a dedicated
//! [`varchunk`](crate::varchunk) pair: `to_worker` carries jobs the RT
//! thread enqueued (never blocking — a full ring just drops the job, same
//! `NoSpace` discipline as the rest of the message plane), `from_worker`
//! carries completed results back for the RT thread to pick up on a later
//! block.
//!
//! Spinning up one OS thread per module does not scale to large graphs, so
//! [`WorkerPool`] offers the bounded alternative the design note in §9
//! calls out: a fixed number of threads shared across every module that
//! asks for worker support, each job tagged with the [`ModuleId`] it
//! belongs to so results can be routed back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::module::ModuleId;
use crate::varchunk::Varchunk;

/// How long the worker thread sleeps between polls of an empty `to_worker`
/// ring. A real host would instead park on a semaphore the RT thread posts
/// to after `write_advance`; a short poll interval is a reasonable
/// stand-in that keeps this module free of extra OS-specific wakeup
/// primitives.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// One dedicated worker thread per module, matching §4.12's description of
/// the default case. `to_worker`/`from_worker` are shared with the thread
/// that owns this handle (the application thread), which is the producer
/// for `to_worker` and consumer for `from_worker` — the single-producer/
/// single-consumer roles `Varchunk` requires.
pub struct ModuleWorker {
    pub to_worker: Arc<Varchunk>,
    pub from_worker: Arc<Varchunk>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ModuleWorker {
    /// Spawns the worker thread. `work` is called with each job payload
    /// popped off `to_worker`'s ring and returns the bytes to publish on
    /// `from_worker`.
    pub fn spawn(
        ring_capacity: usize,
        work: impl Fn(&[u8]) -> Vec<u8> + Send + 'static,
    ) -> Self {
        let to_worker = Arc::new(Varchunk::new(ring_capacity));
        let from_worker = Arc::new(Varchunk::new(ring_capacity));
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let to_worker = to_worker.clone();
            let from_worker = from_worker.clone();
            let running = running.clone();
            std::thread::spawn(move || {
                while running.load(Ordering::Acquire) {
                    match to_worker.read_request() {
                        Some((payload, _)) => {
                            let result = work(payload);
                            to_worker.read_advance();
                            if let Some(buf) = from_worker.write_request(result.len()) {
                                buf.copy_from_slice(&result);
                                from_worker.write_advance(result.len());
                            }
                        }
                        None => std::thread::sleep(POLL_INTERVAL),
                    }
                }
            })
        };

        Self {
            to_worker,
            from_worker,
            running,
            handle: Some(handle),
        }
    }
}

impl Drop for ModuleWorker {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// A bounded pool of worker threads shared across every module that
/// declares a worker interface (§9's scaling alternative to one thread per
/// module). Jobs are `(ModuleId, payload)`; results are routed back as
/// `(ModuleId, payload)` through a single shared channel.
pub struct WorkerPool {
    job_tx: mpsc::Sender<(ModuleId, Vec<u8>)>,
    result_rx: mpsc::Receiver<(ModuleId, Vec<u8>)>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    #[must_use]
    pub fn new(
        worker_count: usize,
        process: impl Fn(ModuleId, &[u8]) -> Vec<u8> + Send + Sync + 'static,
    ) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<(ModuleId, Vec<u8>)>();
        let job_rx = std::sync::Arc::new(std::sync::Mutex::new(job_rx));
        let (result_tx, result_rx) = mpsc::channel();
        let process = std::sync::Arc::new(process);

        let handles = (0..worker_count.max(1))
            .map(|_| {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let process = process.clone();
                std::thread::spawn(move || loop {
                    let job = {
                        let rx = job_rx.lock().unwrap();
                        rx.recv()
                    };
                    let Ok((module, payload)) = job else {
                        break;
                    };
                    let result = process(module, &payload);
                    if result_tx.send((module, result)).is_err() {
                        tracing::warn!(module = module.0, "worker result channel closed");
                        break;
                    }
                })
            })
            .collect();

        Self {
            job_tx,
            result_rx,
            handles,
        }
    }

    /// Submits a job for `module`. Returns `false` if every worker has shut
    /// down (the pool is being torn down).
    pub fn submit(&self, module: ModuleId, payload: Vec<u8>) -> bool {
        self.job_tx.send((module, payload)).is_ok()
    }

    /// Non-blockingly drains completed results, calling `f` with each.
    pub fn drain_results(&self, mut f: impl FnMut(ModuleId, Vec<u8>)) {
        while let Ok((module, payload)) = self.result_rx.try_recv() {
            f(module, payload);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Dropping `job_tx` unblocks every worker's `recv()` with an `Err`.
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_pool_processes_and_routes_results_by_module() {
        let pool = WorkerPool::new(2, |_module, payload| {
            payload.iter().map(|b| b * 2).collect()
        });
        pool.submit(ModuleId(0), vec![1, 2, 3]);
        pool.submit(ModuleId(1), vec![4, 5]);

        let mut results = Vec::new();
        while results.len() < 2 {
            pool.drain_results(|module, payload| results.push((module, payload)));
        }
        results.sort_by_key(|(m, _)| m.0);
        assert_eq!(results[0], (ModuleId(0), vec![2, 4, 6]));
        assert_eq!(results[1], (ModuleId(1), vec![8, 10]));
    }

    #[test]
    fn module_worker_shuts_down_cleanly_on_drop() {
        let worker = ModuleWorker::spawn(1024, |payload| payload.to_vec());
        drop(worker);
    }

    #[test]
    fn module_worker_round_trips_a_job() {
        let worker = ModuleWorker::spawn(1024, |payload| {
            payload.iter().map(|b| b + 1).collect()
        });
        let buf = worker.to_worker.write_request(3).unwrap();
        buf.copy_from_slice(&[1, 2, 3]);
        worker.to_worker.write_advance(3);

        let deadline = std::time::Instant::now() + Duration::from_secs(1);
        loop {
            if let Some((payload, _)) = worker.from_worker.read_request() {
                assert_eq!(payload, &[2, 3, 4]);
                worker.from_worker.read_advance();
                break;
            }
            assert!(std::time::Instant::now() < deadline, "worker timed out");
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}
