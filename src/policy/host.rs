// ABOUTME: Target host allow-list.
// ABOUTME: An empty list is an open policy that admits every host.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostPolicy {
    hosts: Vec<String>,
}

impl HostPolicy {
    pub fn new<I>(hosts: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }

    /// Exact, case-sensitive membership; always true when unrestricted.
    pub fn is_allowed(&self, host: &str) -> bool {
        self.is_unrestricted() || self.hosts.iter().any(|h| h == host)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Human-readable allow-list for error messages.
    pub fn describe(&self) -> String {
        if self.is_unrestricted() {
            "(unrestricted)".to_string()
        } else {
            self.hosts.join(", ")
        }
    }
}
