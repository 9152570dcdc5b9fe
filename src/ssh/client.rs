// ABOUTME: russh implementation of the gateway transport.
// ABOUTME: Password login, known_hosts verification, exec and PTY channels.

use super::error::{Error, Result};
use super::transport::{
    ChannelEvent, CommandOutput, Connection, Connector, GatewayCredentials, InteractiveChannel,
};
use async_trait::async_trait;
use russh::client::{self, Config, Handle, Msg};
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::ssh_key;
use russh::{Channel, ChannelMsg, Disconnect};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Terminal geometry requested for PTY channels.
const PTY_TERM: &str = "xterm";
const PTY_COLUMNS: u32 = 80;
const PTY_ROWS: u32 = 24;

/// Host key policy and keepalive settings for gateway connections.
#[derive(Debug, Clone)]
pub struct ConnectorOptions {
    /// Whether to accept unknown hosts (Trust On First Use).
    /// If false, connection to unknown hosts will fail.
    pub trust_on_first_use: bool,
    /// Optional path to known_hosts file.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
    /// Interval between SSH keepalive requests on an idle connection.
    pub keepalive_interval: Duration,
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self {
            trust_on_first_use: true,
            known_hosts_path: None,
            keepalive_interval: Duration::from_secs(30),
        }
    }
}

impl ConnectorOptions {
    pub fn trust_on_first_use(mut self, tofu: bool) -> Self {
        self.trust_on_first_use = tofu;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }
}

/// SSH client handler for russh.
///
/// The handler lives inside russh's session task, so dropping it marks the
/// end of the connection; `closed` observes that through the watch channel.
pub(crate) struct GatewayHandler {
    host: String,
    port: u16,
    trust_on_first_use: bool,
    known_hosts_path: Option<PathBuf>,
    _alive: watch::Sender<()>,
}

impl client::Handler for GatewayHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let check_result = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        match check_result {
            Ok(true) => Ok(true),
            Ok(false) if self.trust_on_first_use => {
                tracing::warn!(
                    "Trust-On-First-Use: accepting unknown gateway key for {}:{}",
                    self.host,
                    self.port
                );
                let learn_result = match &self.known_hosts_path {
                    Some(path) => {
                        learn_known_hosts_path(&self.host, self.port, server_public_key, path)
                    }
                    None => learn_known_hosts(&self.host, self.port, server_public_key),
                };
                if let Err(e) = learn_result {
                    tracing::warn!("Failed to save host key to known_hosts: {}", e);
                }
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(russh::keys::Error::KeyChanged { .. }) => {
                tracing::error!("gateway host key for {} has changed", self.host);
                Ok(false)
            }
            Err(_) => Ok(self.trust_on_first_use),
        }
    }
}

/// Dials the gateway with russh and password authentication.
#[derive(Debug, Clone, Default)]
pub struct RusshConnector {
    options: ConnectorOptions,
}

impl RusshConnector {
    pub fn new(options: ConnectorOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Connector for RusshConnector {
    type Connection = RusshConnection;

    async fn connect(&self, credentials: &GatewayCredentials) -> Result<RusshConnection> {
        let russh_config = Config {
            inactivity_timeout: None,
            keepalive_interval: Some(self.options.keepalive_interval),
            ..Default::default()
        };

        let (alive_tx, alive_rx) = watch::channel(());
        let handler = GatewayHandler {
            host: credentials.host.clone(),
            port: credentials.port,
            trust_on_first_use: self.options.trust_on_first_use,
            known_hosts_path: self.options.known_hosts_path.clone(),
            _alive: alive_tx,
        };

        let mut handle = client::connect(
            Arc::new(russh_config),
            (credentials.host.as_str(), credentials.port),
            handler,
        )
        .await
        .map_err(|e| match e {
            russh::Error::UnknownKey => Error::HostKeyRejected(credentials.host.clone()),
            e if e.to_string().contains("Connection refused") => Error::Connection(format!(
                "connection refused to {}:{}",
                credentials.host, credentials.port
            )),
            e => Error::Connection(e.to_string()),
        })?;

        let auth = handle
            .authenticate_password(
                credentials.username.as_str(),
                credentials.password.expose(),
            )
            .await?;
        if !auth.success() {
            return Err(Error::AuthenticationFailed(credentials.username.clone()));
        }

        Ok(RusshConnection {
            handle,
            alive: alive_rx,
        })
    }
}

/// An authenticated russh session to the gateway.
pub struct RusshConnection {
    handle: Handle<GatewayHandler>,
    alive: watch::Receiver<()>,
}

impl std::fmt::Debug for RusshConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusshConnection")
            .field("handle", &"<russh::Handle>")
            .field("closed", &self.handle.is_closed())
            .finish()
    }
}

impl RusshConnection {
    async fn open_channel(&self) -> Result<Channel<Msg>> {
        self.handle
            .channel_open_session()
            .await
            .map_err(|e| Error::Channel(format!("failed to open channel: {}", e)))
    }
}

#[async_trait]
impl Connection for RusshConnection {
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        let mut channel = self.open_channel().await?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::Channel(format!("failed to exec command: {}", e)))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;
        let mut got_eof = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                    exit_status = Some(status);
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) => {
                    got_eof = true;
                    if exit_status.is_some() {
                        break;
                    }
                }
                Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            }
        }

        Ok(CommandOutput {
            exit_status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    async fn open_pty(&self, command: &str) -> Result<Box<dyn InteractiveChannel>> {
        let channel = self.open_channel().await?;

        channel
            .request_pty(false, PTY_TERM, PTY_COLUMNS, PTY_ROWS, 0, 0, &[])
            .await
            .map_err(|e| Error::Channel(format!("failed to request pty: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::Channel(format!("failed to exec command: {}", e)))?;

        Ok(Box::new(PtyChannel { channel }))
    }

    async fn closed(&self) {
        let mut alive = self.alive.clone();
        while alive.changed().await.is_ok() {}
    }

    async fn close(&self) -> Result<()> {
        if self.handle.is_closed() {
            return Ok(());
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)
    }
}

/// PTY channel over russh; stdout and stderr arrive merged.
pub struct PtyChannel {
    channel: Channel<Msg>,
}

#[async_trait]
impl InteractiveChannel for PtyChannel {
    async fn recv(&mut self) -> Option<ChannelEvent> {
        loop {
            match self.channel.wait().await? {
                ChannelMsg::Data { data } | ChannelMsg::ExtendedData { data, .. } => {
                    return Some(ChannelEvent::Data(data.to_vec()));
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    return Some(ChannelEvent::ExitStatus(exit_status));
                }
                ChannelMsg::Eof => return Some(ChannelEvent::Eof),
                ChannelMsg::Close => return None,
                _ => {}
            }
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.channel.data(data).await.map_err(Error::Protocol)
    }
}
