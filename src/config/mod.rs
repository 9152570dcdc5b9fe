// ABOUTME: Configuration types and loading for the gateway broker.
// ABOUTME: Reads a JSON or YAML file named by CONFIG_FILE, falling back to defaults.

mod gateway;

pub use gateway::GatewayAddress;

use crate::error::{Error, Result};
use crate::gateway::{DEFAULT_IDLE_TIMEOUT, KerberosCredentials};
use crate::policy::{CommandPolicy, HostPolicy};
use crate::secret::Secret;
use crate::ssh::GatewayCredentials;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file.
pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE";

#[rustfmt::skip]
pub const DEFAULT_ALLOWED_COMMANDS: &[&str] = &[
    "tail", "head", "cat", "grep", "less", "more", "zcat", "zgrep",
    "ls", "pwd", "whoami", "hostname", "uptime",
    "df", "du", "free", "top", "ps", "htop",
    "netstat", "ss", "ping", "curl", "wget",
    "date", "wc", "sort", "uniq", "awk", "sed", "cut",
    "find", "which", "echo", "journalctl",
    "systemctl status", "docker ps", "docker logs",
];

/// Redirection, backticks, subshells and command chaining.
pub const DEFAULT_BLOCKED_PATTERNS: &[&str] = &[">", "`", "$(", ";", "&&", "||"];

/// On-disk shape, before the gateway address is parsed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default)]
    gateway_connection: Option<String>,
    #[serde(default)]
    gateway_password: Secret,
    #[serde(default)]
    kinit_password: Secret,
    #[serde(default = "default_trust_first_connection")]
    trust_first_connection: bool,
    #[serde(default)]
    allowed_hosts: Vec<String>,
    #[serde(default = "default_allowed_commands")]
    allowed_commands: Vec<String>,
    #[serde(default = "default_blocked_patterns")]
    blocked_patterns: Vec<String>,
    #[serde(default)]
    server_info: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "default_idle_timeout", with = "humantime_serde")]
    idle_timeout: Duration,
}

fn default_trust_first_connection() -> bool {
    true
}

fn default_allowed_commands() -> Vec<String> {
    DEFAULT_ALLOWED_COMMANDS.iter().map(|s| s.to_string()).collect()
}

fn default_blocked_patterns() -> Vec<String> {
    DEFAULT_BLOCKED_PATTERNS.iter().map(|s| s.to_string()).collect()
}

fn default_idle_timeout() -> Duration {
    DEFAULT_IDLE_TIMEOUT
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gateway: GatewayAddress,
    pub gateway_password: Secret,
    /// Empty means Kerberos is not used.
    pub kinit_password: Secret,
    pub trust_first_connection: bool,
    pub hosts: HostPolicy,
    pub commands: CommandPolicy,
    /// Free-form information handed to clients through `get_config`.
    pub server_info: serde_json::Map<String, serde_json::Value>,
    pub idle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gateway: GatewayAddress::default(),
            gateway_password: Secret::default(),
            kinit_password: Secret::default(),
            trust_first_connection: default_trust_first_connection(),
            hosts: HostPolicy::default(),
            commands: CommandPolicy::new(
                DEFAULT_ALLOWED_COMMANDS,
                DEFAULT_BLOCKED_PATTERNS.iter().copied(),
            ),
            server_info: serde_json::Map::new(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl TryFrom<RawConfig> for Config {
    type Error = Error;

    fn try_from(raw: RawConfig) -> Result<Self> {
        // An empty or blank connection string counts as unset.
        let gateway = match raw.gateway_connection.as_deref().map(str::trim) {
            Some(connection) if !connection.is_empty() => {
                GatewayAddress::parse(connection).map_err(Error::InvalidConfig)?
            }
            _ => GatewayAddress::default(),
        };

        if raw.idle_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "idleTimeout must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            gateway,
            gateway_password: raw.gateway_password,
            kinit_password: raw.kinit_password,
            trust_first_connection: raw.trust_first_connection,
            hosts: HostPolicy::new(raw.allowed_hosts),
            commands: CommandPolicy::new(raw.allowed_commands, raw.blocked_patterns),
            server_info: raw.server_info,
            idle_timeout: raw.idle_timeout,
        })
    }
}

impl Config {
    /// Parse a YAML document; JSON documents are accepted as well.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(yaml)?;
        Config::try_from(raw)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load from the file named by `CONFIG_FILE`.
    ///
    /// Without the variable, defaults are used. A file that cannot be read or
    /// parsed is logged and replaced by defaults; an invalid gateway address
    /// or idle timeout is still an error.
    pub fn from_env() -> Result<Self> {
        let Some(path) = std::env::var_os(CONFIG_FILE_ENV) else {
            return Ok(Config::default());
        };
        let path = PathBuf::from(path);

        let raw = std::fs::read_to_string(&path)
            .map_err(Error::from)
            .and_then(|content| serde_yaml::from_str::<RawConfig>(&content).map_err(Error::from));

        match raw {
            Ok(raw) => Config::try_from(raw),
            Err(e) => {
                tracing::warn!("failed to read {}: {}; using defaults", path.display(), e);
                Ok(Config::default())
            }
        }
    }

    pub fn gateway_credentials(&self) -> GatewayCredentials {
        GatewayCredentials::new(&self.gateway.host, &self.gateway.user)
            .port(self.gateway.port)
            .password(self.gateway_password.clone())
    }

    pub fn kerberos(&self) -> Option<KerberosCredentials> {
        if self.kinit_password.is_empty() {
            None
        } else {
            Some(KerberosCredentials::new(self.kinit_password.clone()))
        }
    }
}

/// Where configuration comes from, kept so it can be reloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `CONFIG_FILE`, lenient about unreadable files.
    Env,
    /// An explicit path; any failure is an error.
    File(PathBuf),
}

impl ConfigSource {
    pub fn load(&self) -> Result<Config> {
        match self {
            ConfigSource::Env => Config::from_env(),
            ConfigSource::File(path) => Config::load(path),
        }
    }
}
