//! SFTP Session management
//!
//! Provides SFTP file operations over an existing SSH connection. A channel
//! is opened per operation batch and dropped afterwards; the SSH session
//! itself stays in the registry.

use std::path::Path;

use async_trait::async_trait;
use russh_sftp::client::error::Error as SftpErrorInner;
use russh_sftp::client::SftpSession as RusshSftpSession;
use russh_sftp::protocol::FileAttributes;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::delete::RemoteFs;
use super::error::SftpError;
use super::path_utils::{is_absolute_remote_path, join_remote_path};
use super::types::{sort_entries, DirectoryEntry};
use crate::ssh::{ConnectionIdentity, HandleController};

/// An open SFTP subsystem on one SSH connection
pub struct SftpChannel {
    sftp: RusshSftpSession,
    identity: ConnectionIdentity,
}

impl SftpChannel {
    /// Open the SFTP subsystem through the connection's handle owner
    pub async fn open(
        controller: &HandleController,
        identity: &ConnectionIdentity,
    ) -> Result<Self, SftpError> {
        debug!("Opening SFTP subsystem for {}", identity);

        let channel = controller
            .open_session_channel()
            .await
            .map_err(|e| SftpError::ChannelError(e.to_string()))?;

        channel.request_subsystem(true, "sftp").await.map_err(|e| {
            SftpError::SubsystemNotAvailable(format!("Failed to request SFTP subsystem: {}", e))
        })?;

        let sftp = RusshSftpSession::new(channel.into_stream())
            .await
            .map_err(|e| SftpError::SubsystemNotAvailable(e.to_string()))?;

        Ok(Self {
            sftp,
            identity: identity.clone(),
        })
    }

    /// List directory contents, directories first
    pub async fn list_dir(&self, path: &str) -> Result<Vec<DirectoryEntry>, SftpError> {
        let dir = self.resolve_path(path).await?;
        debug!("Listing remote directory {} on {}", dir, self.identity);

        let read_dir = self
            .sftp
            .read_dir(&dir)
            .await
            .map_err(|e| map_sftp_error(e, &dir))?;

        let mut entries: Vec<DirectoryEntry> = read_dir
            .filter_map(|entry| {
                let name = entry.file_name();
                if name == "." || name == ".." {
                    return None;
                }
                let path = join_remote_path(&dir, &name);
                Some(to_entry(name, path, &entry.metadata()))
            })
            .collect();

        sort_entries(&mut entries);
        Ok(entries)
    }

    /// Get file information
    pub async fn stat(&self, path: &str) -> Result<DirectoryEntry, SftpError> {
        let path = self.resolve_path(path).await?;

        let metadata = self
            .sftp
            .metadata(&path)
            .await
            .map_err(|e| map_sftp_error(e, &path))?;

        let name = Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(to_entry(name, path, &metadata))
    }

    /// Copy a local file to `remote_path`, replacing it. Returns bytes sent.
    pub async fn upload(&self, local_path: &str, remote_path: &str) -> Result<u64, SftpError> {
        let remote_path = self.resolve_path(remote_path).await?;
        info!("Uploading {} -> {}:{}", local_path, self.identity, remote_path);

        let mut local_file = tokio::fs::File::open(local_path).await?;
        let mut remote_file = self
            .sftp
            .create(&remote_path)
            .await
            .map_err(|e| map_sftp_error(e, &remote_path))?;

        let transferred = tokio::io::copy(&mut local_file, &mut remote_file).await?;
        remote_file.shutdown().await?;

        info!("Upload complete: {} bytes", transferred);
        Ok(transferred)
    }

    /// Copy `remote_path` to a local file, replacing it. Returns bytes
    /// received.
    pub async fn download(&self, remote_path: &str, local_path: &str) -> Result<u64, SftpError> {
        let remote_path = self.resolve_path(remote_path).await?;
        info!("Downloading {}:{} -> {}", self.identity, remote_path, local_path);

        let mut remote_file = self
            .sftp
            .open(&remote_path)
            .await
            .map_err(|e| map_sftp_error(e, &remote_path))?;
        let mut local_file = tokio::fs::File::create(local_path).await?;

        let transferred = tokio::io::copy(&mut remote_file, &mut local_file).await?;
        local_file.flush().await?;

        info!("Download complete: {} bytes", transferred);
        Ok(transferred)
    }

    /// End the SFTP subsystem (the SSH connection stays up)
    pub async fn close(self) {
        let _ = self.sftp.close().await;
    }

    /// `~` and `~/...` are relative to the login directory; everything else
    /// is used as given.
    async fn resolve_path(&self, path: &str) -> Result<String, SftpError> {
        if is_absolute_remote_path(path) {
            return Ok(path.to_string());
        }

        let home = self
            .sftp
            .canonicalize(".")
            .await
            .map_err(|e| SftpError::ProtocolError(e.to_string()))?;

        match path {
            "" | "~" | "." => Ok(home),
            _ => {
                let rest = path.strip_prefix("~/").unwrap_or(path);
                Ok(join_remote_path(&home, rest))
            }
        }
    }
}

#[async_trait]
impl RemoteFs for SftpChannel {
    async fn stat(&self, path: &str) -> Result<DirectoryEntry, SftpError> {
        SftpChannel::stat(self, path).await
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<DirectoryEntry>, SftpError> {
        self.list_dir(path).await
    }

    async fn remove_file(&self, path: &str) -> Result<(), SftpError> {
        let path = self.resolve_path(path).await?;
        self.sftp
            .remove_file(&path)
            .await
            .map_err(|e| map_sftp_error(e, &path))
    }

    async fn remove_dir(&self, path: &str) -> Result<(), SftpError> {
        let path = self.resolve_path(path).await?;
        self.sftp
            .remove_dir(&path)
            .await
            .map_err(|e| map_sftp_error(e, &path))
    }
}

fn to_entry(name: String, path: String, metadata: &FileAttributes) -> DirectoryEntry {
    DirectoryEntry {
        name,
        path,
        is_directory: metadata.is_dir(),
        size: metadata.size.unwrap_or(0),
        modified: metadata.mtime.map(|t| t as i64).unwrap_or(0),
        permissions: metadata.permissions.unwrap_or(0),
    }
}

/// Map SFTP errors to our error type
fn map_sftp_error(err: SftpErrorInner, path: &str) -> SftpError {
    let err_str = err.to_string();
    if err_str.contains("No such file") || err_str.contains("not found") {
        SftpError::FileNotFound(path.to_string())
    } else if err_str.contains("Permission denied") {
        SftpError::PermissionDenied(path.to_string())
    } else {
        SftpError::ProtocolError(err_str)
    }
}
