//! Derive command - print the identity for a seed.

use anyhow::{Context as _, Result};
use clap::Args;

use super::Context;

/// Arguments for the derive command.
#[derive(Args, Debug)]
pub struct DeriveArgs {
    /// Seed (token or user id) to derive from
    pub seed: String,

    /// Also print the secret scalar
    #[arg(long)]
    pub show_secret: bool,
}

/// Run the derive command.
pub async fn run(args: DeriveArgs, ctx: &Context) -> Result<()> {
    for line in render(&args, ctx.verbose)? {
        println!("{line}");
    }
    Ok(())
}

fn render(args: &DeriveArgs, verbose: bool) -> Result<Vec<String>> {
    let identity = warden_identity::derive(&args.seed)
        .with_context(|| format!("cannot derive identity from {:?}", args.seed))?;

    let mut lines = Vec::new();
    if verbose || args.show_secret {
        lines.push(format!("public_id: {}", identity.public_id()));
    } else {
        lines.push(identity.public_id().to_string());
    }
    if args.show_secret {
        lines.push(format!("secret:    {}", identity.secret_hex()));
    }
    Ok(lines)
}
