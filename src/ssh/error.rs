// ABOUTME: Transport-level SSH error types.
// ABOUTME: Covers dialing, password authentication, and channel failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("authentication failed for user {0}")]
    AuthenticationFailed(String),

    #[error("channel failed: {0}")]
    Channel(String),

    #[error("host key for {0} was rejected")]
    HostKeyRejected(String),

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
