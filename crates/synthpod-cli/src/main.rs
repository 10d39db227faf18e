//! A thin binary wiring `synthpod-core`'s engine to the dummy backend
//! driver and the in-memory plugin catalog, for manual and scripted
//! exercise. Not part of the engine's own contractual surface (§10.1) —
//! a real host supplies its own bundle scanner and hardware driver.

mod chain;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "synthpod")]
#[command(author, version, about = "Synthpod engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every plugin the built-in test catalog knows about
    Plugins,

    /// Build a chain of plugins and run it for a number of blocks
    Run(chain::RunArgs),

    /// Open the dummy backend driver and simulate a few blocks
    Driver(chain::DriverArgs),

    /// Save or load a graph's logical state as a TOML bundle
    Bundle(chain::BundleArgs),

    /// Show or save the default engine resource configuration
    Config(chain::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plugins => chain::run_plugins(),
        Commands::Run(args) => chain::run_chain(args),
        Commands::Driver(args) => chain::run_driver(args),
        Commands::Bundle(args) => chain::run_bundle(args),
        Commands::Config(args) => chain::run_config(args),
    }
}
