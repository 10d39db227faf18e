//! Builds and runs plugin chains against the dummy driver and in-memory
//! catalog. A chain here is just a straight line: plugin `i`'s first audio
//! output feeds plugin `i + 1`'s first audio input, positioned left to
//! right so the graph's own `(x, y)` ordering runs them in chain order.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use synthpod_config::{state, DriverConfig};
use synthpod_core::graph::Graph;
use synthpod_core::module::{Module, ModuleId};
use synthpod_core::port::{Direction, Port, PortRef};
use synthpod_core::state::GraphState;
use synthpod_io::{BackendDriver, DriverInitConfig, DummyDriver};
use synthpod_registry::{PluginCatalog, TestCatalog};

const DEFAULT_SAMPLE_RATE: f64 = 48_000.0;
const DEFAULT_BLOCK_SIZE: usize = 512;

#[derive(Args)]
pub struct RunArgs {
    /// Plugin URIs to chain, in order
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "urn:synthpod:test:oscillator,urn:synthpod:test:gain"
    )]
    pub plugins: Vec<String>,

    /// Number of blocks to run
    #[arg(long, default_value_t = 8)]
    pub blocks: usize,

    /// Block size in samples
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,

    /// Use the parallel runner with this many worker threads instead of the serial one
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Args)]
pub struct DriverArgs {
    /// Number of blocks to simulate
    #[arg(long, default_value_t = 4)]
    pub blocks: usize,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Write the default config to this path instead of printing it
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct BundleArgs {
    #[command(subcommand)]
    pub command: BundleCommand,
}

#[derive(Subcommand)]
pub enum BundleCommand {
    /// Build the default demo chain and save its state to a bundle
    Save {
        path: PathBuf,
        #[arg(
            long,
            value_delimiter = ',',
            default_value = "urn:synthpod:test:oscillator,urn:synthpod:test:gain"
        )]
        plugins: Vec<String>,
    },
    /// Load a bundle and print its modules and connections
    Load { path: PathBuf },
}

fn build_module(
    catalog: &dyn PluginCatalog,
    uri: &str,
    position: (i32, i32),
    sample_rate: f64,
    max_block: usize,
) -> anyhow::Result<Module> {
    let descriptor_meta = catalog
        .get(uri)
        .ok_or_else(|| anyhow::anyhow!("unknown plugin uri: {uri}"))?;
    let ports = descriptor_meta
        .ports
        .iter()
        .map(|t| Port::new(t.direction, t.kind.clone(), max_block))
        .collect();
    let descriptor = catalog
        .instantiate(uri)
        .ok_or_else(|| anyhow::anyhow!("unknown plugin uri: {uri}"))?;
    Ok(Module::new(ModuleId(0), uri.to_string(), position, descriptor, sample_rate, ports))
}

/// Builds a straight-line chain, connecting each module's first audio
/// output to the next module's first audio input where both exist.
fn build_chain(
    graph: &mut Graph,
    catalog: &dyn PluginCatalog,
    uris: &[String],
    sample_rate: f64,
    max_block: usize,
) -> anyhow::Result<Vec<ModuleId>> {
    let mut ids = Vec::with_capacity(uris.len());
    for (i, uri) in uris.iter().enumerate() {
        let module = build_module(catalog, uri, (i as i32, 0), sample_rate, max_block)?;
        ids.push(graph.add_module(module));
    }

    for pair in ids.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let src_index = graph.with_module(a, |m| {
            m.ports.iter().position(|p| p.direction == Direction::Output)
        });
        let dst_index = graph.with_module(b, |m| {
            m.ports.iter().position(|p| p.direction == Direction::Input)
        });
        if let (Some(Some(src)), Some(Some(dst))) = (src_index, dst_index) {
            graph.connect(PortRef::new(a, src), PortRef::new(b, dst), 1.0, 0)?;
        }
    }

    Ok(ids)
}

pub fn run_plugins() -> anyhow::Result<()> {
    let catalog = TestCatalog::new();
    println!("Available plugins");
    println!("==================\n");
    for plugin in catalog.all_plugins() {
        println!("{}", plugin.uri);
        println!("  name:     {}", plugin.name);
        println!("  category: {:?}", plugin.category);
        println!("  ports:    {}", plugin.ports.len());
        println!("  {}\n", plugin.description);
    }
    Ok(())
}

pub fn run_chain(args: RunArgs) -> anyhow::Result<()> {
    let catalog = TestCatalog::new();
    let mut graph = Graph::new(args.block_size);
    let ids = build_chain(&mut graph, &catalog, &args.plugins, DEFAULT_SAMPLE_RATE, args.block_size)?;

    for _ in 0..args.blocks {
        match args.workers {
            Some(workers) => graph.run_parallel(args.block_size, workers),
            None => graph.run_serial(args.block_size),
        }
    }

    println!("Ran {} block(s) through {} module(s)", args.blocks, ids.len());
    for id in &ids {
        if let Some(timing) = graph.timing_of(*id) {
            println!(
                "  module {}: count={} min={:?} avg={:?} max={:?}",
                id.0,
                timing.count,
                timing.min,
                timing.avg(),
                timing.max
            );
        }
    }
    Ok(())
}

pub fn run_driver(args: DriverArgs) -> anyhow::Result<()> {
    let mut driver = DummyDriver::new(DriverInitConfig::default());
    println!(
        "dummy driver: sample_rate={} max_block_size={}",
        driver.sample_rate(),
        driver.max_block_size()
    );

    let block = driver.max_block_size();
    for _ in 0..args.blocks {
        driver.run_pre(block);
        driver.run_post(block);
    }
    println!("simulated {} block(s), xruns reported: {}", args.blocks, driver.xrun_count);
    Ok(())
}

pub fn run_bundle(args: BundleArgs) -> anyhow::Result<()> {
    match args.command {
        BundleCommand::Save { path, plugins } => {
            let catalog = TestCatalog::new();
            let mut graph = Graph::new(DEFAULT_BLOCK_SIZE);
            build_chain(&mut graph, &catalog, &plugins, DEFAULT_SAMPLE_RATE, DEFAULT_BLOCK_SIZE)?;

            let graph_state = GraphState::capture(&graph);
            state::save(&graph_state, &path)?;
            println!(
                "Saved bundle with {} module(s) and {} connection(s) to {}",
                graph_state.modules.len(),
                graph_state.connections.len(),
                path.display()
            );
        }
        BundleCommand::Load { path } => {
            let graph_state = state::load(&path)?;
            println!("Bundle: {}", path.display());
            println!("Modules:");
            for (i, module) in graph_state.modules.iter().enumerate() {
                println!(
                    "  [{i}] {} at {:?} bypassed={} controls={:?}",
                    module.uri, module.position, module.bypassed, module.controls
                );
            }
            println!("Connections:");
            for connection in &graph_state.connections {
                println!(
                    "  {:?}:{} -> {:?}:{} gain={}",
                    connection.src.module, connection.src.index,
                    connection.dst.module, connection.dst.index,
                    connection.gain
                );
            }
        }
    }
    Ok(())
}

pub fn run_config(args: ConfigArgs) -> anyhow::Result<()> {
    let cfg = DriverConfig::default();
    match args.path {
        Some(path) => {
            cfg.save(&path)?;
            println!("Saved default driver config to {}", path.display());
        }
        None => {
            println!("{}", cfg.to_toml()?);
        }
    }
    Ok(())
}
