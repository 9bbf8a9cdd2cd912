//! Warden - session-authenticating RPC interceptor
//!
//! Developer CLI for deriving identities, inspecting configuration and
//! running calls through an intercepted service.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, derive, simulate};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Warden - session-authenticating RPC interceptor
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Config file (default: <config dir>/warden/warden.toml)
    #[arg(long = "config", global = true, env = "WARDEN_CONFIG")]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Derive the public identity for a seed
    Derive(derive::DeriveArgs),

    /// Configuration management
    Config(config::ConfigArgs),

    /// Run calls through an intercepted echo service
    Simulate(simulate::SimulateArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    let ctx = commands::Context {
        config_path: cli.config_path,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Derive(args) => derive::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
        Commands::Simulate(args) => simulate::run(args, &ctx).await,
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let default_filter = if verbose {
        "warden=debug,warden_rpc=debug,warden_session=debug,warden_identity=debug,info"
    } else {
        "warden=info,warden_rpc=info,warden_session=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
    });
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .init();
}
