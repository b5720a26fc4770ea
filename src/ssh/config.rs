//! SSH Configuration

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConnectionError;

/// Key identifying one logical session slot: `host:port:username`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionIdentity(String);

impl ConnectionIdentity {
    pub fn new(host: &str, port: u16, username: &str) -> Self {
        Self(format!("{}:{}:{}", host, port, username))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConnectionIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ConnectionIdentity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// SSH connection configuration
///
/// Immutable once a session has been created from it; the registry keeps a
/// copy for silent reconnection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Remote host address
    pub host: String,

    /// SSH port (default: 22)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username for authentication
    pub username: String,

    /// Exactly one credential kind per attempt
    pub credential: Credential,
}

impl ConnectionConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            credential,
        }
    }

    /// Build a config from optional credential fields as found in saved
    /// profiles. A private key wins over a password when both are set.
    pub fn from_parts(
        host: impl Into<String>,
        port: Option<u16>,
        username: impl Into<String>,
        private_key: Option<String>,
        password: Option<String>,
    ) -> Result<Self, ConnectionError> {
        let credential = match (private_key, password) {
            (Some(key_path), _) if !key_path.is_empty() => Credential::PrivateKey { key_path },
            (_, Some(password)) if !password.is_empty() => Credential::Password { password },
            _ => return Err(ConnectionError::MissingCredentials),
        };

        Ok(Self::new(host, port.unwrap_or_else(default_port), username, credential))
    }

    pub fn identity(&self) -> ConnectionIdentity {
        ConnectionIdentity::new(&self.host, self.port, &self.username)
    }
}

/// Authentication credential
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    /// Path to a private key file, read before any network activity
    PrivateKey { key_path: String },

    /// Password authentication
    Password { password: String },
}

impl Credential {
    pub fn private_key(key_path: impl Into<String>) -> Self {
        Self::PrivateKey {
            key_path: key_path.into(),
        }
    }

    pub fn password(password: impl Into<String>) -> Self {
        Self::Password {
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::PrivateKey { key_path } => f
                .debug_struct("PrivateKey")
                .field("key_path", key_path)
                .finish(),
            Credential::Password { .. } => f
                .debug_struct("Password")
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Transport tuning applied to every session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionPolicy {
    /// Keep-alive ping interval in seconds
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,

    /// Unanswered keep-alives before the transport is dropped
    #[serde(default = "default_keepalive_max")]
    pub keepalive_max: usize,

    /// Bound on TCP connect + handshake + authentication, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl ConnectionPolicy {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            keepalive_interval_secs: default_keepalive_interval(),
            keepalive_max: default_keepalive_max(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_port() -> u16 {
    22
}

fn default_keepalive_interval() -> u64 {
    15
}

fn default_keepalive_max() -> usize {
    5
}

fn default_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_format() {
        let config = ConnectionConfig::new("example.com", 1022, "deploy", Credential::password("x"));
        assert_eq!(config.identity().as_str(), "example.com:1022:deploy");
    }

    #[test]
    fn test_from_parts_prefers_private_key() {
        let config = ConnectionConfig::from_parts(
            "h",
            None,
            "u",
            Some("/keys/id".to_string()),
            Some("secret".to_string()),
        )
        .unwrap();
        assert_eq!(config.port, 22);
        assert_eq!(config.credential, Credential::private_key("/keys/id"));
    }

    #[test]
    fn test_from_parts_requires_a_credential() {
        let err = ConnectionConfig::from_parts("h", Some(22), "u", None, Some(String::new()))
            .unwrap_err();
        assert!(matches!(err, ConnectionError::MissingCredentials));
    }

    #[test]
    fn test_password_is_redacted_in_debug() {
        let rendered = format!("{:?}", Credential::password("hunter2"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_policy_defaults() {
        let policy: ConnectionPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy.keepalive_interval(), Duration::from_secs(15));
        assert_eq!(policy.keepalive_max, 5);
        assert_eq!(policy.timeout(), Duration::from_secs(30));
    }
}
