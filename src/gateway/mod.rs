// ABOUTME: Gateway session lifecycle and two-hop command execution.
// ABOUTME: Owns the one reusable jump-host connection and its Kerberos state.

mod error;
mod executor;
mod idle;
mod kinit;
mod session;

pub use error::{Error, Result};
pub use executor::{CommandExecutor, ExecOutput, second_hop_command, shell_quote};
pub use kinit::{KINIT_COMMAND, KerberosCredentials, MarkerPrompt, PromptDetector};
pub use session::{DEFAULT_IDLE_TIMEOUT, GatewaySession, SessionConfig, SessionState};
