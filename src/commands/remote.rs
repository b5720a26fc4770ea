//! Remote file commands
//!
//! Every operation goes through the same pipeline:
//!
//! ```text
//! request ─► RateLimiter::throttle ─► ensure_usable ─► SFTP / exec channel
//! ```
//!
//! so a dropped connection is rebuilt before the operation runs, and rapid
//! UI actions never hit one server back to back.
//!
//! # Commands
//!
//! - `connect_session` / `disconnect_session`
//! - `list_remote_directory` (+ `_with_retry`)
//! - `delete_remote`, `delete_remote_via_exec`, `delete_remote_with_fallback`
//! - `upload_file` / `download_file`
//! - `delete_from_both`
//! - `navigate`

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::local;
use crate::sftp::{
    delete_recursive, delete_via_shell_exec, retry_with_backoff, DeleteError, DeletePolicy,
    DirectoryEntry, ListError, RetryConfig, SftpChannel, SyncError,
};
use crate::ssh::{
    ConnectionConfig, ConnectionError, ConnectionIdentity, ConnectionPolicy, ConnectionRegistry,
    RateLimiter, RemoteSession, SshConnector,
};
use crate::sync::{DualDeleteReport, NavigationEvent, PanePair, PathError, PathSide};

/// Result of `connect_session`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOutcome {
    pub connection_id: ConnectionIdentity,
    pub success: bool,
}

/// How a remote entry was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DeleteMethod {
    /// Structured SFTP removal, with the number of entries removed
    Sftp { removed: u64 },
    /// `rm -rf` over an exec channel
    ShellExec,
}

/// Owner of all remote state: live sessions, their configs and the
/// per-connection pacing.
pub struct RemoteCommands {
    registry: ConnectionRegistry<SshConnector>,
    limiter: RateLimiter,
    delete_policy: DeletePolicy,
}

impl RemoteCommands {
    pub fn new(policy: ConnectionPolicy, delete_policy: DeletePolicy) -> Self {
        Self {
            registry: ConnectionRegistry::new(SshConnector::new(policy)),
            limiter: RateLimiter::default(),
            delete_policy,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry<SshConnector> {
        &self.registry
    }

    /// Throttle, then hand out a usable session
    async fn session(&self, id: &ConnectionIdentity) -> Result<RemoteSession, ConnectionError> {
        self.limiter.throttle(id).await;
        self.registry.ensure_usable(id).await
    }

    pub async fn connect_session(
        &self,
        config: ConnectionConfig,
    ) -> Result<ConnectOutcome, ConnectionError> {
        let identity = config.identity();
        self.limiter.throttle(&identity).await;

        let connection_id = self.registry.connect(config).await?;
        Ok(ConnectOutcome {
            connection_id,
            success: true,
        })
    }

    /// Always succeeds, whether or not the session existed
    pub async fn disconnect_session(&self, id: &ConnectionIdentity) {
        self.registry.disconnect(id).await;
        self.limiter.forget(id);
    }

    pub async fn list_remote_directory(
        &self,
        id: &ConnectionIdentity,
        path: &str,
    ) -> Result<Vec<DirectoryEntry>, ListError> {
        let session = self.session(id).await?;
        let sftp = SftpChannel::open(session.controller(), id).await?;

        let result = sftp.list_dir(path).await;
        sftp.close().await;
        Ok(result?)
    }

    /// `list_remote_directory` with capped retries and exponential backoff
    pub async fn list_remote_directory_with_retry(
        &self,
        id: &ConnectionIdentity,
        path: &str,
        retry: &RetryConfig,
    ) -> Result<Vec<DirectoryEntry>, ListError> {
        let what = format!("Listing {} on {}", path, id);
        retry_with_backoff(&what, retry, || self.list_remote_directory(id, path)).await
    }

    /// Structured recursive delete over SFTP. Opening the SFTP channel counts
    /// against the delete timeout.
    pub async fn delete_remote(&self, id: &ConnectionIdentity, path: &str) -> Result<u64, DeleteError> {
        let session = self.session(id).await?;

        tokio::time::timeout(self.delete_policy.timeout(), async {
            let sftp = SftpChannel::open(session.controller(), id).await?;
            let result = delete_recursive(&sftp, path, &self.delete_policy).await;
            sftp.close().await;
            result
        })
        .await
        .map_err(|_| {
            warn!("Delete of {} on {} timed out", path, id);
            DeleteError::Timeout(self.delete_policy.timeout_secs)
        })?
    }

    /// `rm -rf` over an exec channel
    pub async fn delete_remote_via_exec(
        &self,
        id: &ConnectionIdentity,
        path: &str,
    ) -> Result<(), DeleteError> {
        let session = self.session(id).await?;
        delete_via_shell_exec(&session, path).await
    }

    /// Structured delete first; shell exec when the SFTP channel is unusable
    /// or the target is a directory.
    pub async fn delete_remote_with_fallback(
        &self,
        id: &ConnectionIdentity,
        path: &str,
        is_directory: bool,
    ) -> Result<DeleteMethod, DeleteError> {
        delete_with_fallback(
            path,
            is_directory,
            self.delete_remote(id, path),
            || self.delete_remote_via_exec(id, path),
        )
        .await
    }

    pub async fn upload_file(
        &self,
        id: &ConnectionIdentity,
        local_path: &str,
        remote_path: &str,
    ) -> Result<u64, SyncError> {
        let session = self.session(id).await?;
        let sftp = SftpChannel::open(session.controller(), id).await?;

        let local_path = local::expand_tilde(local_path);
        let result = sftp
            .upload(&local_path.to_string_lossy(), remote_path)
            .await;
        sftp.close().await;
        Ok(result?)
    }

    pub async fn download_file(
        &self,
        id: &ConnectionIdentity,
        remote_path: &str,
        local_path: &str,
    ) -> Result<u64, SyncError> {
        let session = self.session(id).await?;
        let sftp = SftpChannel::open(session.controller(), id).await?;

        let local_path = local::expand_tilde(local_path);
        let result = sftp
            .download(remote_path, &local_path.to_string_lossy())
            .await;
        sftp.close().await;
        Ok(result?)
    }

    /// Delete an entry and its counterpart in the other pane. Each side is
    /// attempted regardless of the other's outcome.
    pub async fn delete_from_both(
        &self,
        id: &ConnectionIdentity,
        panes: &PanePair,
        side: PathSide,
        path: &str,
        is_directory: bool,
    ) -> DualDeleteReport {
        let counterpart = panes.counterpart(side, path);
        let (local_path, remote_path) = match side {
            PathSide::Local => (path.to_string(), counterpart),
            PathSide::Remote => (counterpart, path.to_string()),
        };

        info!("Deleting from both: local {}, remote {}", local_path, remote_path);

        let local_error = local::delete_local(&local_path)
            .await
            .err()
            .map(|e| e.to_string());
        let remote_error = self
            .delete_remote_with_fallback(id, &remote_path, is_directory)
            .await
            .err()
            .map(|e| e.to_string());

        let report = DualDeleteReport {
            local_path,
            remote_path,
            local_error,
            remote_error,
        };
        if !report.fully_deleted() {
            warn!("Delete from both incomplete: {}", report.errors().join("; "));
        }
        report
    }

    /// Move one pane and sync the other. Path-bar entries are checked by
    /// listing them first; if that fails neither pane moves.
    pub async fn navigate(
        &self,
        id: &ConnectionIdentity,
        panes: &mut PanePair,
        side: PathSide,
        path: &str,
        event: NavigationEvent,
    ) -> Result<Option<String>, PathError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(PathError::Empty);
        }

        let path = match side {
            PathSide::Local => local::expand_tilde(path).to_string_lossy().to_string(),
            PathSide::Remote => path.to_string(),
        };

        if event == NavigationEvent::PathEntry {
            let listed = match side {
                PathSide::Local => local::list_local_directory(&path).await,
                PathSide::Remote => self.list_remote_directory(id, &path).await,
            };
            if let Err(e) = listed {
                return Err(PathError::Unreachable {
                    path,
                    reason: e.to_string(),
                });
            }
        }

        Ok(panes.navigate(side, path, event))
    }

    /// Disconnect everything (application shutdown)
    pub async fn shutdown(&self) {
        self.registry.disconnect_all().await;
    }
}

impl Default for RemoteCommands {
    fn default() -> Self {
        Self::new(ConnectionPolicy::default(), DeletePolicy::default())
    }
}

/// Run `structured`; on a failure that warrants it, run `exec` instead.
async fn delete_with_fallback<S, X, XFut>(
    path: &str,
    is_directory: bool,
    structured: S,
    exec: X,
) -> Result<DeleteMethod, DeleteError>
where
    S: Future<Output = Result<u64, DeleteError>>,
    X: FnOnce() -> XFut,
    XFut: Future<Output = Result<(), DeleteError>>,
{
    match structured.await {
        Ok(removed) => Ok(DeleteMethod::Sftp { removed }),
        Err(e) if e.wants_exec_fallback(is_directory) => {
            warn!("SFTP delete of {} failed, trying shell exec: {}", path, e);
            exec().await?;
            info!("Deleted {} via shell exec", path);
            Ok(DeleteMethod::ShellExec)
        }
        Err(e) => Err(e),
    }
}
