//! CLI command handlers.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use warden_rpc::WardenConfig;

pub mod config;
pub mod derive;
pub mod simulate;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file, if given.
    pub config_path: Option<PathBuf>,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Load the configuration this invocation should use.
    pub fn load_config(&self) -> Result<WardenConfig> {
        warden_rpc::load_config(self.config_path.as_deref()).with_context(|| match &self.config_path {
            Some(path) => format!("failed to load config from {}", path.display()),
            None => "failed to load default config".to_string(),
        })
    }
}
