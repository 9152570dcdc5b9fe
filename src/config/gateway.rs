// ABOUTME: Gateway address parsing.
// ABOUTME: Accepts "user@host" and "user@host:port".

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayAddress {
    pub user: String,
    pub host: String,
    pub port: u16,
}

impl Default for GatewayAddress {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            host: "localhost".to_string(),
            port: 22,
        }
    }
}

impl GatewayAddress {
    pub fn parse(s: &str) -> Result<Self, String> {
        let invalid = || format!("invalid gatewayConnection: {s} (expected user@host:port)");

        let (user, rest) = s.split_once('@').ok_or_else(invalid)?;
        if user.is_empty() {
            return Err(invalid());
        }

        let (host, port) = match rest.split_once(':') {
            Some((host, port)) => {
                if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port in gatewayConnection: {port}"))?;
                (host, port)
            }
            None => (rest, 22),
        };

        if host.is_empty() {
            return Err(invalid());
        }

        Ok(GatewayAddress {
            user: user.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for GatewayAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}
