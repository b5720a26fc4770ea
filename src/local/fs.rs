//! Local filesystem operations for the local pane

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{debug, info};

use crate::sftp::error::{DeleteError, ListError};
use crate::sftp::types::{sort_entries, DirectoryEntry};

/// List a local directory, directories first
pub async fn list_local_directory(path: &str) -> Result<Vec<DirectoryEntry>, ListError> {
    let dir = expand_tilde(path);
    debug!("Listing local directory {}", dir.display());

    let mut read_dir = tokio::fs::read_dir(&dir).await?;
    let mut entries = Vec::new();

    while let Some(item) = read_dir.next_entry().await? {
        let full_path = item.path();

        // Follow symlinks; a dangling link is listed as itself
        let metadata = match tokio::fs::metadata(&full_path).await {
            Ok(m) => m,
            Err(_) => tokio::fs::symlink_metadata(&full_path).await?,
        };

        entries.push(DirectoryEntry {
            name: item.file_name().to_string_lossy().to_string(),
            path: full_path.to_string_lossy().to_string(),
            is_directory: metadata.is_dir(),
            size: metadata.len(),
            modified: modified_secs(&metadata),
            permissions: mode_bits(&metadata),
        });
    }

    sort_entries(&mut entries);
    Ok(entries)
}

/// Delete a file or a whole directory tree. A missing path is not an error.
pub async fn delete_local(path: &str) -> Result<(), DeleteError> {
    let target = expand_tilde(path);

    let metadata = match tokio::fs::symlink_metadata(&target).await {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Local delete of missing path {}", target.display());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    info!("Deleting local {}", target.display());

    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(&target).await
    } else {
        tokio::fs::remove_file(&target).await
    };

    match result {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Create a directory and any missing parents; existing directories are fine
pub async fn create_local_directory(path: &str) -> Result<(), std::io::Error> {
    let target = expand_tilde(path);
    tokio::fs::create_dir_all(&target).await
}

/// Replace a leading `~` with the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    let home = || dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));

    if path == "~" {
        return home();
    }
    match path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        Some(rest) => home().join(rest),
        None => PathBuf::from(path),
    }
}

fn modified_secs(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(unix)]
fn mode_bits(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn mode_bits(metadata: &std::fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o666
    }
}

/// Whether `path` exists locally (without following a final symlink)
pub async fn local_path_exists(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path).await.is_ok()
}
