//! Config command - configuration inspection.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration as TOML
    Show,

    /// Show the configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = ctx.load_config()?;
    let text = config
        .to_toml_string()
        .context("failed to serialize configuration")?;

    match &ctx.config_path {
        Some(path) => println!("# {}\n", path.display()),
        None => match warden_rpc::default_config_path() {
            Some(path) if path.exists() => println!("# {}\n", path.display()),
            _ => println!("# No config file loaded (using defaults)\n"),
        },
    }
    print!("{text}");
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let path = ctx
        .config_path
        .clone()
        .or_else(warden_rpc::default_config_path)
        .context("no config directory on this platform")?;
    println!("{}", path.display());
    Ok(())
}
