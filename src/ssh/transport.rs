// ABOUTME: Transport traits the gateway session is written against.
// ABOUTME: Lets the session run over russh in production and in-memory fakes in tests.

use super::error::Result;
use crate::secret::Secret;
use async_trait::async_trait;

/// Where and as whom to reach the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCredentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Secret,
}

impl GatewayCredentials {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: username.into(),
            password: Secret::default(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn password(mut self, password: impl Into<Secret>) -> Self {
        self.password = password.into();
        self
    }
}

/// Output from a command executed on the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status, if the channel reported one before closing.
    pub exit_status: Option<u32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }
}

/// Something read from an interactive (PTY) channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Data(Vec<u8>),
    ExitStatus(u32),
    Eof,
}

/// A PTY channel running a single command.
#[async_trait]
pub trait InteractiveChannel: Send {
    /// Next event from the channel, or `None` once it has closed.
    async fn recv(&mut self) -> Option<ChannelEvent>;

    /// Write bytes to the command's terminal.
    async fn send(&mut self, data: &[u8]) -> Result<()>;
}

/// An established, authenticated connection to the gateway.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Run a command on an exec channel, collecting stdout and stderr until close.
    async fn exec(&self, command: &str) -> Result<CommandOutput>;

    /// Run a command on a channel with a pseudo-terminal attached.
    async fn open_pty(&self, command: &str) -> Result<Box<dyn InteractiveChannel>>;

    /// Resolves once the underlying transport has gone away.
    async fn closed(&self);

    /// Close the transport.
    async fn close(&self) -> Result<()>;
}

/// Dials the gateway.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Connection;

    async fn connect(&self, credentials: &GatewayCredentials) -> Result<Self::Connection>;
}
