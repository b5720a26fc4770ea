//! SSH Error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("SSH connection failed: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Failed to read private key: {0}")]
    KeyRead(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Either privateKey or password must be provided")]
    MissingCredentials,

    #[error("SSH connection {0} not found and no config available for reconnection")]
    NoReconnectConfig(String),

    #[error("SSH reconnection failed: {0}")]
    ReconnectFailed(Box<ConnectionError>),

    #[error("Connection {0} is already live with different credentials")]
    IdentityConflict(String),

    #[error("SSH protocol error: {0}")]
    Protocol(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Disconnected")]
    Disconnected,
}

impl From<russh::Error> for ConnectionError {
    fn from(err: russh::Error) -> Self {
        ConnectionError::Protocol(err.to_string())
    }
}

impl From<russh::keys::Error> for ConnectionError {
    fn from(err: russh::keys::Error) -> Self {
        ConnectionError::KeyRead(err.to_string())
    }
}

// Errors cross the UI boundary as plain messages
impl serde::Serialize for ConnectionError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
