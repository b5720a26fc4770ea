//! SFTP Error types

use thiserror::Error;

use crate::ssh::ConnectionError;

/// Low-level SFTP failures
#[derive(Error, Debug)]
pub enum SftpError {
    #[error("SFTP error: channel could not be opened: {0}")]
    ChannelError(String),

    #[error("SFTP error: subsystem not available: {0}")]
    SubsystemNotAvailable(String),

    #[error("No such file: {0}")]
    FileNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("SFTP protocol error: {0}")]
    ProtocolError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SftpError {
    /// The SFTP subsystem itself is unusable, as opposed to a single
    /// operation failing.
    pub fn is_channel_level(&self) -> bool {
        matches!(
            self,
            SftpError::ChannelError(_) | SftpError::SubsystemNotAvailable(_)
        )
    }
}

/// Directory listing failures (remote or local)
#[derive(Error, Debug)]
pub enum ListError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Failed to read remote directory: {0}")]
    Remote(#[from] SftpError),

    #[error("Failed to read directory: {0}")]
    Local(#[from] std::io::Error),
}

/// Deletion failures (remote or local)
#[derive(Error, Debug)]
pub enum DeleteError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Sftp(#[from] SftpError),

    /// Listing failed and the directory could not be removed directly either
    #[error("Failed to read directory contents and unable to remove {path}: {source}")]
    Unreadable { path: String, source: SftpError },

    /// The remote tree is in an indeterminate state afterwards
    #[error("Delete operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Delete failed with exit code {}: {stderr}", exit_code_label(.code))]
    Exec { code: Option<u32>, stderr: String },

    #[error("Failed to delete file: {0}")]
    Local(#[from] std::io::Error),
}

fn exit_code_label(code: &Option<u32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none".to_string())
}

impl DeleteError {
    /// Whether a failed structured delete should be retried as `rm -rf`
    pub fn wants_exec_fallback(&self, is_directory: bool) -> bool {
        if is_directory {
            return !matches!(self, DeleteError::Connection(_) | DeleteError::Local(_));
        }
        match self {
            DeleteError::Sftp(e) => e.is_channel_level(),
            DeleteError::Connection(ConnectionError::Channel(_)) => true,
            _ => false,
        }
    }
}

/// Upload/download failures
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Failed to sync file: {0}")]
    Sftp(#[from] SftpError),

    #[error("Failed to sync file: {0}")]
    Local(#[from] std::io::Error),
}

macro_rules! serialize_as_display {
    ($($ty:ty),+) => {
        $(
            impl serde::Serialize for $ty {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: serde::Serializer,
                {
                    serializer.serialize_str(&self.to_string())
                }
            }
        )+
    };
}

serialize_as_display!(SftpError, ListError, DeleteError, SyncError);
