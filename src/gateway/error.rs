// ABOUTME: Errors surfaced by the gateway session and executor.
// ABOUTME: Host policy, dial, Kerberos, and wrapped transport failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("host not allowed: {host} (allowed hosts: {allowed})")]
    HostNotAllowed { host: String, allowed: String },

    #[error("command contains a line break")]
    LineBreakInCommand,

    #[error("gateway connection failed: {0}")]
    Connection(String),

    #[error("kinit failed ({}): {output}", status_label(.status))]
    Authentication { status: Option<u32>, output: String },

    #[error("not connected to the gateway")]
    NotConnected,

    #[error(transparent)]
    Transport(#[from] crate::ssh::Error),
}

fn status_label(status: &Option<u32>) -> String {
    match status {
        Some(code) => format!("code: {code}"),
        None => "no exit status".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
