// ABOUTME: Tool dispatch over the gateway session and the current configuration.
// ABOUTME: Applies both policy gates before any command reaches the gateway.

mod mcp;
mod tools;

pub use mcp::tool_definitions;
pub use tools::{
    ExecArgs, TOOL_DISCONNECT, TOOL_EXEC, TOOL_GET_CONFIG, TOOL_NAMES, TOOL_RELOAD_CONFIG,
    TOOL_STATUS, ToolResponse,
};

use crate::config::{Config, ConfigSource};
use crate::gateway::{self, CommandExecutor, ExecOutput, GatewaySession, SessionConfig};
use crate::ssh::Connector;
use parking_lot::RwLock;
use rmcp::model::JsonObject;
use serde_json::{Value, json};
use std::sync::Arc;

/// Session settings derived from a configuration snapshot.
pub fn session_config(config: &Config) -> SessionConfig {
    SessionConfig::new(config.gateway_credentials())
        .kerberos(config.kerberos())
        .idle_timeout(config.idle_timeout)
}

/// Owns the gateway session and the configuration it runs under.
pub struct Broker<K: Connector> {
    session: GatewaySession<K>,
    config: RwLock<Arc<Config>>,
    source: ConfigSource,
}

impl<K: Connector> Broker<K> {
    pub fn new(connector: K, config: Config, source: ConfigSource) -> Self {
        let session = GatewaySession::new(connector, session_config(&config));
        Self {
            session,
            config: RwLock::new(Arc::new(config)),
            source,
        }
    }

    pub fn session(&self) -> &GatewaySession<K> {
        &self.session
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config.read())
    }

    /// Dispatch a tool call by name.
    pub async fn call(&self, tool: &str, arguments: Option<JsonObject>) -> ToolResponse {
        tracing::debug!("tool call: {}", tool);
        match tool {
            TOOL_EXEC => match serde_json::from_value::<ExecArgs>(Value::Object(
                arguments.unwrap_or_default(),
            )) {
                Ok(args) => self.exec(&args).await,
                Err(e) => ToolResponse::error(format!("invalid arguments for exec: {e}")),
            },
            TOOL_DISCONNECT => self.disconnect_server().await,
            TOOL_STATUS => self.connection_status(),
            TOOL_GET_CONFIG => self.get_config(),
            TOOL_RELOAD_CONFIG => self.reload_config(),
            other => ToolResponse::error(format!(
                "unknown tool: {other} (available: {})",
                TOOL_NAMES.join(", ")
            )),
        }
    }

    /// Validate host and command, then run it through the gateway.
    pub async fn exec(&self, args: &ExecArgs) -> ToolResponse {
        let config = self.config();

        if !config.hosts.is_allowed(&args.host) {
            let err = gateway::Error::HostNotAllowed {
                host: args.host.clone(),
                allowed: config.hosts.describe(),
            };
            return ToolResponse::error(err.to_string());
        }

        if let Err(e) = config.commands.validate(&args.command) {
            return ToolResponse::error(format!("command blocked: {e}"));
        }

        let executor = CommandExecutor::new(&self.session, &config.hosts);
        match executor.run(&args.host, &args.user, &args.command).await {
            Ok(output) => ToolResponse::ok(format_output(&output)),
            Err(e) => ToolResponse::error(format!("command execution failed: {e}")),
        }
    }

    pub async fn disconnect_server(&self) -> ToolResponse {
        let was_connected = self.session.is_connected();
        self.session.disconnect().await;
        if was_connected {
            ToolResponse::ok("gateway connection closed")
        } else {
            ToolResponse::ok("no active gateway connection")
        }
    }

    pub fn connection_status(&self) -> ToolResponse {
        let idle_disconnect_at = self.session.idle_deadline().and_then(|deadline| {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            chrono::Duration::from_std(remaining)
                .ok()
                .map(|d| (chrono::Utc::now() + d).to_rfc3339())
        });

        let status = json!({
            "gateway": {
                "host": self.session.gateway_host(),
                "connected": self.session.is_connected(),
                "idleDisconnectAt": idle_disconnect_at,
            },
            "kerberos": {
                "authenticated": self.session.is_authenticated(),
            },
        });
        pretty(&status)
    }

    pub fn get_config(&self) -> ToolResponse {
        let config = self.config();
        let allowed_hosts = if config.hosts.is_unrestricted() {
            json!("(unrestricted - all hosts allowed)")
        } else {
            json!(config.hosts.hosts())
        };
        let allowed_commands: Vec<&str> =
            config.commands.allowed().iter().map(|c| c.as_str()).collect();

        let body = json!({
            "allowedHosts": allowed_hosts,
            "allowedCommands": allowed_commands,
            "serverInfo": config.server_info,
        });
        pretty(&body)
    }

    /// Reload configuration from its source.
    ///
    /// New credentials apply to the next dial; a live connection is kept.
    pub fn reload_config(&self) -> ToolResponse {
        match self.source.load() {
            Ok(config) => {
                self.session
                    .set_credentials(config.gateway_credentials(), config.kerberos());
                *self.config.write() = Arc::new(config);
                tracing::info!("configuration reloaded");
                ToolResponse::ok("configuration reloaded")
            }
            Err(e) => {
                tracing::warn!("configuration reload failed: {}", e);
                ToolResponse::error(format!("configuration reload failed: {e}"))
            }
        }
    }
}

fn pretty(value: &serde_json::Value) -> ToolResponse {
    match serde_json::to_string_pretty(value) {
        Ok(text) => ToolResponse::ok(text),
        Err(e) => ToolResponse::error(format!("failed to encode response: {e}")),
    }
}

/// Render captured streams the way clients read them.
pub fn format_output(output: &ExecOutput) -> String {
    let mut parts = Vec::new();
    if !output.stdout.is_empty() {
        parts.push(format!("[stdout]\n{}", output.stdout.trim()));
    }
    if !output.stderr.is_empty() {
        parts.push(format!("[stderr]\n{}", output.stderr.trim()));
    }
    if parts.is_empty() {
        "(no output)".to_string()
    } else {
        parts.join("\n\n")
    }
}
