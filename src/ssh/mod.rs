// ABOUTME: SSH transport to the gateway host.
// ABOUTME: Defines the transport seam and its russh-backed implementation.

mod client;
mod error;
mod transport;

pub use client::{ConnectorOptions, PtyChannel, RusshConnection, RusshConnector};
pub use error::{Error, Result};
pub use transport::{
    ChannelEvent, CommandOutput, Connection, Connector, GatewayCredentials, InteractiveChannel,
};
