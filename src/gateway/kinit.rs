// ABOUTME: Kerberos ticket acquisition over an interactive PTY channel.
// ABOUTME: Answers password prompts found by a pluggable prompt detector.

use super::error::{Error, Result};
use crate::secret::Secret;
use crate::ssh::{ChannelEvent, Connection};

/// Command run on the gateway to obtain a ticket.
pub const KINIT_COMMAND: &str = "kinit";

/// Password used to answer the ticket-granting prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KerberosCredentials {
    pub password: Secret,
}

impl KerberosCredentials {
    pub fn new(password: impl Into<Secret>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

/// Recognizes password prompts in accumulated terminal output.
///
/// Prompt wording depends on the gateway's locale and Kerberos build, so the
/// heuristic is kept behind this trait.
pub trait PromptDetector: Send + Sync {
    /// Number of prompts present in `output`, which holds everything read so far.
    fn prompt_count(&self, output: &str) -> usize;
}

/// Counts occurrences of a fixed marker substring.
#[derive(Debug, Clone)]
pub struct MarkerPrompt {
    marker: String,
}

impl MarkerPrompt {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl Default for MarkerPrompt {
    fn default() -> Self {
        Self::new("Password")
    }
}

impl PromptDetector for MarkerPrompt {
    fn prompt_count(&self, output: &str) -> usize {
        if self.marker.is_empty() {
            return 0;
        }
        output.matches(self.marker.as_str()).count()
    }
}

/// Run `kinit` on the gateway, answering each prompt exactly once.
///
/// A password that cannot be written to the PTY fails as `Authentication`
/// with no exit status.
pub(crate) async fn acquire_ticket<C>(
    conn: &C,
    credentials: &KerberosCredentials,
    detector: &dyn PromptDetector,
) -> Result<()>
where
    C: Connection + ?Sized,
{
    let mut channel = conn.open_pty(KINIT_COMMAND).await?;

    let answer = format!("{}\n", credentials.password.expose());
    let mut raw = Vec::new();
    let mut output = String::new();
    let mut answered = 0;
    let mut status = None;

    while let Some(event) = channel.recv().await {
        match event {
            ChannelEvent::Data(data) => {
                raw.extend_from_slice(&data);
                output = String::from_utf8_lossy(&raw).into_owned();
                let prompts = detector.prompt_count(&output);
                while answered < prompts {
                    if let Err(e) = channel.send(answer.as_bytes()).await {
                        tracing::warn!("failed to send kinit password: {}", e);
                        return Err(Error::Authentication {
                            status: None,
                            output,
                        });
                    }
                    answered += 1;
                }
            }
            ChannelEvent::ExitStatus(code) => status = Some(code),
            ChannelEvent::Eof => {}
        }
    }

    match status {
        Some(0) => {
            tracing::info!("kinit succeeded");
            Ok(())
        }
        status => Err(Error::Authentication { status, output }),
    }
}
