//! TOML configuration.
//!
//! ```toml
//! service_identity = "79be...98"
//!
//! [session]
//! retention_secs = 3600
//! sweep_interval_secs = 1800
//!
//! [interceptor]
//! synthesize_token_from_peer = true
//! cache_additional_user_id = true
//!
//! [policy]
//! kind = "allow_list"
//! identities = ["79be...98"]
//! methods = ["Echo"]
//! ```
//!
//! Every section is optional; missing keys take their defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_identity::PublicId;
use warden_session::{DEFAULT_RETENTION, DEFAULT_SWEEP_INTERVAL, SessionCache, SessionConfig};

use crate::adapter::ServiceAdapter;
use crate::error::ConfigError;
use crate::gate::{AllowAll, AuthorizationGate, AuthorizationPolicy, DenyAll, IdentityAllowList};
use crate::interceptor::{InterceptorConfig, MethodInterceptor};

/// Default service identity used when none is configured.
pub const DEFAULT_SERVICE_IDENTITY: &str = "warden";

/// Config file name inside the config directory.
const CONFIG_FILE_NAME: &str = "warden.toml";

type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WardenConfig {
    /// This service's own identity, mixed into synthesized tokens.
    pub service_identity: String,

    /// Session cache settings.
    pub session: SessionSettings,

    /// Interceptor switches.
    pub interceptor: InterceptorConfig,

    /// Authorization policy.
    pub policy: PolicyConfig,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            service_identity: DEFAULT_SERVICE_IDENTITY.to_string(),
            session: SessionSettings::default(),
            interceptor: InterceptorConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

/// `[session]` section; durations in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSettings {
    pub retention_secs: u64,
    pub sweep_interval_secs: u64,
    pub sweep_task: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            retention_secs: DEFAULT_RETENTION.as_secs(),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL.as_secs(),
            sweep_task: true,
        }
    }
}

/// `[policy]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum PolicyConfig {
    /// Allow every call.
    #[default]
    AllowAll,
    /// Deny every call.
    DenyAll,
    /// Allow listed identities, optionally only for listed methods.
    AllowList {
        identities: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        methods: Option<Vec<String>>,
    },
}

impl PolicyConfig {
    /// Build the policy object.
    pub fn build(&self) -> Result<Arc<dyn AuthorizationPolicy>> {
        Ok(match self {
            PolicyConfig::AllowAll => Arc::new(AllowAll),
            PolicyConfig::DenyAll => Arc::new(DenyAll),
            PolicyConfig::AllowList {
                identities,
                methods,
            } => {
                let identities = identities
                    .iter()
                    .map(|s| PublicId::parse(s))
                    .collect::<warden_identity::Result<Vec<_>>>()?;
                let mut list = IdentityAllowList::new(identities);
                if let Some(methods) = methods {
                    list = list.with_methods(methods.iter().cloned());
                }
                Arc::new(list)
            }
        })
    }
}

impl WardenConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: WardenConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;
        debug!(path = %path.display(), "Loading config file");
        Self::from_toml_str(&content)
    }

    /// Load from the default location, or defaults if no file exists there.
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Check values that parse but cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.service_identity.is_empty() {
            return Err(invalid("service_identity", "must not be empty"));
        }
        if self.session.retention_secs == 0 {
            return Err(invalid("session.retention_secs", "must be greater than zero"));
        }
        if self.session.sweep_interval_secs == 0 {
            return Err(invalid(
                "session.sweep_interval_secs",
                "must be greater than zero",
            ));
        }
        self.policy.build()?;
        Ok(())
    }

    /// Session cache configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new()
            .with_retention(Duration::from_secs(self.session.retention_secs))
            .with_sweep_interval(Duration::from_secs(self.session.sweep_interval_secs))
            .with_sweep_task(self.session.sweep_task)
    }

    /// Build an adapter with a fresh session cache.
    ///
    /// Starts the sweep task if enabled, so call this inside a tokio runtime.
    pub fn build_adapter(&self) -> Result<ServiceAdapter> {
        let gate = AuthorizationGate::new(self.policy.build()?);
        let sessions = SessionCache::new(self.session_config());
        let interceptor = MethodInterceptor::new(
            self.service_identity.clone(),
            sessions,
            gate,
            self.interceptor,
        );
        Ok(ServiceAdapter::new(Arc::new(interceptor)))
    }
}

/// Load from `path` if given, otherwise from the default location.
pub fn load_config(path: Option<&Path>) -> Result<WardenConfig> {
    match path {
        Some(path) => WardenConfig::load(path),
        None => WardenConfig::load_default(),
    }
}

/// Default config path: `<config dir>/warden/warden.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("warden").join(CONFIG_FILE_NAME))
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn id(seed: &str) -> String {
        warden_identity::derive(seed).unwrap().public_id().to_string()
    }

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = WardenConfig::from_toml_str("").unwrap();
        assert_eq!(config, WardenConfig::default());
        assert_eq!(config.session_config(), SessionConfig::default());
    }

    #[test]
    fn test_full_document() {
        let toml = format!(
            r#"
service_identity = "pool-key"

[session]
retention_secs = 120
sweep_interval_secs = 30
sweep_task = false

[interceptor]
synthesize_token_from_peer = false

[policy]
kind = "allow_list"
identities = ["{}"]
methods = ["Echo"]
"#,
            id("alice")
        );

        let config = WardenConfig::from_toml_str(&toml).unwrap();

        assert_eq!(config.service_identity, "pool-key");
        assert_eq!(config.session_config().retention, Duration::from_secs(120));
        assert_eq!(config.session_config().sweep_interval, Duration::from_secs(30));
        assert!(!config.session_config().enable_sweep_task);
        assert!(!config.interceptor.synthesize_token_from_peer);
        assert!(config.interceptor.cache_additional_user_id);
        assert!(matches!(config.policy, PolicyConfig::AllowList { .. }));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = WardenConfig::from_toml_str("[session]\nretention = 5\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_retention_rejected() {
        let result = WardenConfig::from_toml_str("[session]\nretention_secs = 0\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { ref field, .. }) if field == "session.retention_secs"
        ));
    }

    #[test]
    fn test_bad_allow_list_identity_rejected() {
        let result = WardenConfig::from_toml_str(
            "[policy]\nkind = \"allow_list\"\nidentities = [\"not-hex\"]\n",
        );
        assert!(matches!(result, Err(ConfigError::Identity(_))));
    }

    #[test]
    fn test_policy_kinds() {
        let config = WardenConfig::from_toml_str("[policy]\nkind = \"deny_all\"\n").unwrap();
        assert_eq!(config.policy, PolicyConfig::DenyAll);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = WardenConfig {
            policy: PolicyConfig::AllowList {
                identities: vec![id("alice")],
                methods: None,
            },
            ..WardenConfig::default()
        };

        let text = config.to_toml_string().unwrap();
        let parsed = WardenConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "service_identity = \"from-file\"").unwrap();

        let config = WardenConfig::load(file.path()).unwrap();
        assert_eq!(config.service_identity, "from-file");
    }

    #[test]
    fn test_load_config_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[policy]\nkind = \"deny_all\"").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.policy, PolicyConfig::DenyAll);
    }

    #[test]
    fn test_load_missing_file() {
        let result = WardenConfig::load(Path::new("/nonexistent/warden.toml"));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[tokio::test]
    async fn test_build_adapter_applies_policy() {
        let config = WardenConfig {
            policy: PolicyConfig::DenyAll,
            session: SessionSettings {
                sweep_task: false,
                ..SessionSettings::default()
            },
            ..WardenConfig::default()
        };

        let adapter = config.build_adapter().unwrap();
        let interceptor = adapter.interceptor();
        assert!(!interceptor.sessions().is_sweeping());
        assert_eq!(interceptor.config(), &InterceptorConfig::default());
    }
}
