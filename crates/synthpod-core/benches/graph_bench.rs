//! Criterion benchmarks for the module graph (`synthpod_core::graph`).
//!
//! Isolates scheduling/runner overhead from DSP cost using a trivial gain
//! plugin on every module. Two axes:
//!
//! - **serial vs parallel** — `run_serial` against `run_parallel` at a
//!   fixed chain length and block size, across worker counts
//! - **block size sweep** — `run_serial` throughput at varying block sizes
//!
//! Run with: `cargo bench -p synthpod-core -- graph/`
#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use synthpod_core::graph::Graph;
use synthpod_core::module::{Module, ModuleId};
use synthpod_core::plugin::{descriptor_for, Plugin};
use synthpod_core::port::{Direction, Port, PortKind, PortRef};

const SAMPLE_RATE: f64 = 48_000.0;
const BLOCK_SIZE: usize = 256;
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512, 1024];
const CHAIN_LEN: usize = 20;

/// Trivial gain plugin, one audio in, one audio out. Isolates graph
/// scheduling overhead from DSP cost the same way a real module's `run`
/// would be dominated by its own work rather than the host's.
struct Gain {
    input: *const f32,
    output: *mut f32,
}

impl Plugin for Gain {
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
        // SAFETY: both ports are connected to live block-sized buffers by
        // `Module::connect_ports` before any runner calls `run`.
        unsafe {
            for i in 0..sample_count as usize {
                *self.output.add(i) = *self.input.add(i) * 0.9;
            }
        }
    }
}

fn make_gain_module(id: ModuleId, position: (i32, i32), max_block: usize) -> Module {
    let ports = vec![
        Port::new(Direction::Input, PortKind::Audio, max_block),
        Port::new(Direction::Output, PortKind::Audio, max_block),
    ];
    let descriptor = descriptor_for::<Gain>("urn:bench:gain");
    let mut module = Module::new(id, "urn:bench:gain".into(), position, descriptor, SAMPLE_RATE, ports);
    module.activate();
    module
}

/// Builds a straight chain of `n` gain modules, each feeding the next.
fn make_chain(n: usize, max_block: usize) -> Graph {
    let mut graph = Graph::new(max_block);
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let module = make_gain_module(ModuleId(0), (i as i32, 0), max_block);
        ids.push(graph.add_module(module));
    }
    for pair in ids.windows(2) {
        graph
            .connect(PortRef::new(pair[0], 1), PortRef::new(pair[1], 0), 1.0, 0)
            .unwrap();
    }
    graph
}

fn bench_runners(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/runners");

    group.bench_function("serial_chain20_block256", |b| {
        let mut graph = make_chain(CHAIN_LEN, BLOCK_SIZE);
        b.iter(|| graph.run_serial(BLOCK_SIZE));
    });

    for &workers in &[1usize, 2, 4] {
        group.bench_with_input(
            BenchmarkId::new("parallel_chain20_block256", workers),
            &workers,
            |b, &workers| {
                let mut graph = make_chain(CHAIN_LEN, BLOCK_SIZE);
                b.iter(|| graph.run_parallel(BLOCK_SIZE, workers));
            },
        );
    }

    group.finish();
}

fn bench_block_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/block_sweep");

    for &block_size in BLOCK_SIZES {
        group.bench_with_input(
            BenchmarkId::new("serial_chain20", block_size),
            &block_size,
            |b, &block_size| {
                let mut graph = make_chain(CHAIN_LEN, block_size);
                b.iter(|| graph.run_serial(block_size));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_runners, bench_block_sweep);
criterion_main!(benches);
