// ABOUTME: Tool names, argument and response types for the broker.
// ABOUTME: Transport-neutral; the MCP layer converts responses to tool results.

use serde::Deserialize;

pub const TOOL_EXEC: &str = "exec";
pub const TOOL_DISCONNECT: &str = "disconnect_server";
pub const TOOL_STATUS: &str = "connection_status";
pub const TOOL_GET_CONFIG: &str = "get_config";
pub const TOOL_RELOAD_CONFIG: &str = "reload_config";

pub const TOOL_NAMES: &[&str] = &[
    TOOL_EXEC,
    TOOL_DISCONNECT,
    TOOL_STATUS,
    TOOL_GET_CONFIG,
    TOOL_RELOAD_CONFIG,
];

/// Arguments of the `exec` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecArgs {
    /// Target host, checked against the host allow-list.
    pub host: String,
    /// Login user on the target host.
    pub user: String,
    /// Command line, checked against the command policy.
    pub command: String,
}

/// Text shown to the client, flagged when the call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResponse {
    pub text: String,
    pub is_error: bool,
}

impl ToolResponse {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}
