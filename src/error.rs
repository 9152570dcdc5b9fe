// ABOUTME: Application-wide error types for hopgate.
// ABOUTME: Uses thiserror for ergonomic error handling.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("command blocked: {0}")]
    Validation(#[from] crate::policy::ValidationError),

    #[error(transparent)]
    Gateway(#[from] crate::gateway::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MCP server error: {0}")]
    Mcp(String),
}

pub type Result<T> = std::result::Result<T, Error>;
