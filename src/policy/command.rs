// ABOUTME: Command policy: blocked substrings and an allow-list of base commands.
// ABOUTME: Validates pipelines segment by segment before anything is sent to a host.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("blocked pattern: {0}")]
    BlockedPattern(String),

    #[error("command not allowed: {0}")]
    CommandNotAllowed(String),

    #[error("line breaks are not allowed in commands")]
    LineBreak,
}

/// One entry of the command allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedCommand {
    /// Single token, compared against the first word of a segment.
    Exact(String),
    /// Multi-word literal, compared against the start of a segment.
    Prefix(String),
}

impl AllowedCommand {
    pub fn parse(entry: &str) -> Self {
        if entry.contains(' ') {
            AllowedCommand::Prefix(entry.to_string())
        } else {
            AllowedCommand::Exact(entry.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AllowedCommand::Exact(s) | AllowedCommand::Prefix(s) => s,
        }
    }

    fn matches(&self, segment: &str, base: &str) -> bool {
        match self {
            AllowedCommand::Exact(name) => base == name,
            AllowedCommand::Prefix(literal) => segment.starts_with(literal.as_str()),
        }
    }
}

/// Immutable command policy loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct CommandPolicy {
    allowed: Vec<AllowedCommand>,
    blocked: Vec<String>,
}

impl CommandPolicy {
    pub fn new<A, B>(allowed: A, blocked: B) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: Into<String>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|entry| AllowedCommand::parse(entry.as_ref()))
                .collect(),
            blocked: blocked.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allowed(&self) -> &[AllowedCommand] {
        &self.allowed
    }

    pub fn blocked(&self) -> &[String] {
        &self.blocked
    }

    /// Check a raw command line against the policy.
    ///
    /// A line break anywhere rejects, since the target shell treats it as a
    /// command separator. Blocked patterns are searched over the whole trimmed
    /// input next, so a pattern hidden inside an otherwise allowed segment
    /// still rejects. The remaining input is split on `|` and every segment
    /// must match an entry.
    pub fn validate(&self, raw: &str) -> Result<(), ValidationError> {
        if contains_line_break(raw) {
            return Err(ValidationError::LineBreak);
        }

        let trimmed = raw.trim();

        if let Some(pattern) = self.blocked.iter().find(|p| trimmed.contains(p.as_str())) {
            return Err(ValidationError::BlockedPattern(pattern.clone()));
        }

        for segment in trimmed.split('|').map(str::trim) {
            let base = segment.split_whitespace().next().unwrap_or("");
            if !self.allowed.iter().any(|entry| entry.matches(segment, base)) {
                return Err(ValidationError::CommandNotAllowed(base.to_string()));
            }
        }

        Ok(())
    }
}

/// True when `command` holds `\n` or `\r`.
pub fn contains_line_break(command: &str) -> bool {
    command.contains(['\n', '\r'])
}
