//! Recursive remote deletion
//!
//! Two strategies:
//!
//! - [`delete_recursive`]: structured, bottom-up removal over SFTP. Children
//!   are removed one at a time with a short pause after each, and the whole
//!   operation is bounded by a wall-clock timeout.
//! - [`delete_via_shell_exec`]: a single `rm -rf` over an exec channel, used
//!   when the SFTP subsystem is unusable or a directory refuses to go away.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::{DeleteError, SftpError};
use super::types::DirectoryEntry;
use crate::ssh::RemoteExec;

/// The filesystem operations deletion needs
#[async_trait]
pub trait RemoteFs: Send + Sync {
    async fn stat(&self, path: &str) -> Result<DirectoryEntry, SftpError>;

    /// Children of `path`, without `.` and `..`
    async fn read_dir(&self, path: &str) -> Result<Vec<DirectoryEntry>, SftpError>;

    async fn remove_file(&self, path: &str) -> Result<(), SftpError>;

    async fn remove_dir(&self, path: &str) -> Result<(), SftpError>;
}

/// Timeout and pacing for structured deletion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePolicy {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pause after a subdirectory has been removed
    #[serde(default = "default_directory_pause_ms")]
    pub directory_pause_ms: u64,

    /// Pause after a file has been removed
    #[serde(default = "default_file_pause_ms")]
    pub file_pause_ms: u64,
}

impl DeletePolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn directory_pause(&self) -> Duration {
        Duration::from_millis(self.directory_pause_ms)
    }

    fn file_pause(&self) -> Duration {
        Duration::from_millis(self.file_pause_ms)
    }
}

impl Default for DeletePolicy {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            directory_pause_ms: default_directory_pause_ms(),
            file_pause_ms: default_file_pause_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_directory_pause_ms() -> u64 {
    100
}

fn default_file_pause_ms() -> u64 {
    50
}

/// Delete `path` (file or whole tree), returning the number of entries
/// removed.
pub async fn delete_recursive<F>(
    fs: &F,
    path: &str,
    policy: &DeletePolicy,
) -> Result<u64, DeleteError>
where
    F: RemoteFs + ?Sized,
{
    info!("Recursively deleting: {}", path);

    let removed = tokio::time::timeout(policy.timeout(), delete_entry(fs, path, policy))
        .await
        .map_err(|_| {
            warn!("Delete of {} timed out", path);
            DeleteError::Timeout(policy.timeout_secs)
        })??;

    info!("Deleted {} ({} entries)", path, removed);
    Ok(removed)
}

async fn delete_entry<F>(fs: &F, path: &str, policy: &DeletePolicy) -> Result<u64, DeleteError>
where
    F: RemoteFs + ?Sized,
{
    // `~` and relative paths come back resolved; every later call uses that
    let entry = fs.stat(path).await?;

    if entry.is_directory {
        delete_directory(fs, entry.path, policy).await
    } else {
        fs.remove_file(&entry.path).await?;
        Ok(1)
    }
}

// Boxed so the recursion has a finite future size
fn delete_directory<'a, F>(
    fs: &'a F,
    path: String,
    policy: &'a DeletePolicy,
) -> Pin<Box<dyn Future<Output = Result<u64, DeleteError>> + Send + 'a>>
where
    F: RemoteFs + ?Sized,
{
    Box::pin(async move {
        let children = match fs.read_dir(&path).await {
            Ok(children) => children,
            Err(list_err) => {
                warn!("Cannot list {}: {}; trying direct removal", path, list_err);
                return match fs.remove_dir(&path).await {
                    Ok(()) => Ok(1),
                    Err(_) => Err(DeleteError::Unreadable {
                        path,
                        source: list_err,
                    }),
                };
            }
        };

        let mut removed = 0u64;

        for child in children {
            if child.is_directory {
                removed += delete_directory(fs, child.path, policy).await?;
                tokio::time::sleep(policy.directory_pause()).await;
            } else {
                fs.remove_file(&child.path).await?;
                removed += 1;
                tokio::time::sleep(policy.file_pause()).await;
            }
        }

        fs.remove_dir(&path).await?;
        debug!("Removed directory {}", path);
        Ok(removed + 1)
    })
}

/// Quote `path` for a POSIX shell: wrap in single quotes, with each embedded
/// `'` written as `'"'"'`.
pub fn shell_quote(path: &str) -> String {
    format!("'{}'", path.replace('\'', r#"'"'"'"#))
}

/// Shell word for a remote path. A leading `~` becomes `"$HOME"`, since a
/// quoted tilde is never expanded.
fn shell_path(path: &str) -> String {
    match path.strip_prefix('~') {
        Some("") => r#""$HOME""#.to_string(),
        Some(rest) if rest.starts_with('/') => {
            let rest = rest.trim_start_matches('/');
            if rest.is_empty() {
                r#""$HOME"/"#.to_string()
            } else {
                format!(r#""$HOME"/{}"#, shell_quote(rest))
            }
        }
        _ => shell_quote(path),
    }
}

/// Remove `path` with `rm -rf` over an exec channel
pub async fn delete_via_shell_exec<E>(exec: &E, path: &str) -> Result<(), DeleteError>
where
    E: RemoteExec + ?Sized,
{
    let command = format!("rm -rf {}", shell_path(path));
    info!("Deleting via shell: {}", command);

    let output = exec.exec(&command).await?;

    match output.exit_code {
        Some(0) => Ok(()),
        code => {
            let stderr = output.stderr.trim();
            Err(DeleteError::Exec {
                code,
                stderr: if stderr.is_empty() {
                    "Unknown error".to_string()
                } else {
                    stderr.to_string()
                },
            })
        }
    }
}
