// ABOUTME: Two-hop command execution: gateway session plus a nested ssh to the target.
// ABOUTME: Applies the host policy before touching the network.

use super::error::{Error, Result};
use super::session::GatewaySession;
use crate::policy::{HostPolicy, contains_line_break};
use crate::ssh::{Connection, Connector};

/// What a caller gets back from a remote command.
///
/// The exit status is logged but deliberately not part of this type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs pre-validated commands on target hosts through the gateway.
pub struct CommandExecutor<'a, K: Connector> {
    session: &'a GatewaySession<K>,
    hosts: &'a HostPolicy,
}

impl<'a, K: Connector> CommandExecutor<'a, K> {
    pub fn new(session: &'a GatewaySession<K>, hosts: &'a HostPolicy) -> Self {
        Self { session, hosts }
    }

    /// Run `command` on `host` as `user`.
    ///
    /// `command` must already have passed `CommandPolicy::validate`. A command
    /// containing a line break is still refused here, before any dial.
    pub async fn run(&self, host: &str, user: &str, command: &str) -> Result<ExecOutput> {
        if contains_line_break(command) {
            return Err(Error::LineBreakInCommand);
        }

        if !self.hosts.is_allowed(host) {
            return Err(Error::HostNotAllowed {
                host: host.to_string(),
                allowed: self.hosts.describe(),
            });
        }

        let conn = self.session.acquire_connection().await?;

        if self.session.has_kerberos() {
            self.session.ensure_authenticated().await?;
        }

        self.session.reset_idle_timer();

        let remote = second_hop_command(host, user, command);
        tracing::debug!("executing on gateway: {}", remote);

        let output = conn.exec(&remote).await?;

        tracing::debug!(
            exit_status = ?output.exit_status,
            stdout = %output.stdout,
            stderr = %output.stderr,
            "command finished on {}",
            host
        );

        Ok(ExecOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Command line run on the gateway to reach `host`.
///
/// Host key checking is disabled and batch mode forced so the nested ssh
/// never waits on a prompt.
pub fn second_hop_command(host: &str, user: &str, command: &str) -> String {
    format!(
        "ssh -o StrictHostKeyChecking=no -o BatchMode=yes {} {}",
        shell_quote(&format!("{user}@{host}")),
        shell_quote(command)
    )
}

/// Quote `value` as one POSIX shell word.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
