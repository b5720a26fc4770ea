//! Profile Storage
//!
//! Reads and writes the profile list. Location: `~/.servers`.
//!
//! The file is JSON surrounded by `#` comment lines; comment lines are
//! dropped before parsing.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use super::types::Profile;

/// Profile storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to determine home directory")]
    NoHomeDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl serde::Serialize for StorageError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

const FILE_NAME: &str = ".servers";

const HEADER: &str = "\
# Remote File Explorer - Server Configuration
# This file stores server configurations outside of source code
#
# Format: JSON with comments (lines starting with # are ignored)
# Each server has:
# - id: unique identifier
# - name: display name
# - host: server hostname/IP
# - port: SSH port (usually 22 or 1022)
# - username: SSH username
# - privateKey: path to SSH private key (optional)
# - password: SSH password (optional, use either privateKey OR password)
# - localFolder: local directory path
# - remoteFolder: remote directory path
# - database: (optional) database connection info
#   - name: database name
#   - username: database username
#   - password: database password
#   - localPort: local port for SSH tunnel

";

const FOOTER: &str = "

# Example of adding a new server manually:
# {
#   \"id\": \"my_new_server\",
#   \"name\": \"My New Server\",
#   \"host\": \"example.com\",
#   \"port\": 22,
#   \"username\": \"myuser\",
#   \"privateKey\": \"~/.ssh/my_key\",
#   \"localFolder\": \"~/my_project\",
#   \"remoteFolder\": \"/var/www/html\"
# }
";

/// Default profile file path (`~/.servers`)
pub fn profiles_file() -> Result<PathBuf, StorageError> {
    dirs::home_dir()
        .map(|home| home.join(FILE_NAME))
        .ok_or(StorageError::NoHomeDir)
}

/// Drop every line whose first non-blank character is `#`
pub fn strip_comments(contents: &str) -> String {
    contents
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Profile storage manager
pub struct ProfileStorage {
    path: PathBuf,
}

impl ProfileStorage {
    /// Storage at the default path
    pub fn new() -> Result<Self, StorageError> {
        Ok(Self {
            path: profiles_file()?,
        })
    }

    /// Storage at a custom path (for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all profiles.
    ///
    /// A missing file is an empty list. So is an unparsable one, after it has
    /// been copied aside so nothing is lost on the next save.
    pub async fn load(&self) -> Result<Vec<Profile>, StorageError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Profile file not found at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        let json = strip_comments(&contents);
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Vec<Profile>>(&json) {
            Ok(profiles) => {
                debug!("Loaded {} profiles", profiles.len());
                Ok(profiles)
            }
            Err(e) => {
                warn!("Profile file corrupted: {}", e);

                match self.backup().await {
                    Ok(backup_path) => {
                        warn!(
                            "Corrupted profile file backed up to {}",
                            backup_path.display()
                        );
                    }
                    Err(backup_err) => {
                        error!("Failed to back up corrupted profile file: {}", backup_err);
                    }
                }

                Ok(Vec::new())
            }
        }
    }

    /// Save all profiles, replacing the file atomically
    pub async fn save(&self, profiles: &[Profile]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut contents = String::from(HEADER);
        contents.push_str(&serde_json::to_string_pretty(profiles)?);
        contents.push_str(FOOTER);

        // Write to temp file first, then rename
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;

        fs::rename(&temp_path, &self.path).await?;

        info!("Saved {} profiles to {}", profiles.len(), self.path.display());
        Ok(())
    }

    /// Insert `profile`, replacing any profile with the same id
    pub async fn upsert(&self, profile: Profile) -> Result<(), StorageError> {
        let mut profiles = self.load().await?;
        match profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile,
            None => profiles.push(profile),
        }
        self.save(&profiles).await
    }

    /// Copy the current file next to itself with a timestamp suffix
    pub async fn backup(&self) -> Result<PathBuf, StorageError> {
        let backup_path = PathBuf::from(format!(
            "{}.backup.{}",
            self.path.display(),
            chrono::Utc::now().format("%Y%m%d_%H%M%S")
        ));

        fs::copy(&self.path, &backup_path).await?;
        Ok(backup_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn profile(id: &str) -> Profile {
        Profile {
            id: id.to_string(),
            name: format!("Server {}", id),
            host: "example.com".to_string(),
            port: 22,
            username: "deploy".to_string(),
            private_key: None,
            password: Some("pw".to_string()),
            local_folder: "/home/me/site".to_string(),
            remote_folder: "/var/www/site".to_string(),
            database: None,
        }
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let temp = tempdir().unwrap();
        let storage = ProfileStorage::with_path(temp.path().join(".servers"));

        assert!(storage.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = tempdir().unwrap();
        let storage = ProfileStorage::with_path(temp.path().join(".servers"));

        storage.save(&[profile("a"), profile("b")]).await.unwrap();
        let loaded = storage.load().await.unwrap();

        assert_eq!(loaded, vec![profile("a"), profile("b")]);
        let raw = std::fs::read_to_string(storage.path()).unwrap();
        assert!(raw.starts_with("# Remote File Explorer"));
        assert!(!temp.path().join(".servers.tmp").exists());
    }

    #[tokio::test]
    async fn test_hand_written_file_with_comments() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".servers");
        std::fs::write(
            &path,
            "# my servers\n[\n  # inline note\n  {\"id\":\"x\",\"name\":\"X\",\"host\":\"h\",\"username\":\"u\",\"privateKey\":\"/k\"}\n]\n",
        )
        .unwrap();

        let loaded = ProfileStorage::with_path(path).load().await.unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].private_key.as_deref(), Some("/k"));
    }

    #[tokio::test]
    async fn test_corrupted_file_is_backed_up() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".servers");
        std::fs::write(&path, "[{ not json").unwrap();

        let loaded = ProfileStorage::with_path(path).load().await.unwrap();

        assert!(loaded.is_empty());
        let backups = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".servers.backup."))
            .count();
        assert_eq!(backups, 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let temp = tempdir().unwrap();
        let storage = ProfileStorage::with_path(temp.path().join(".servers"));
        storage.save(&[profile("a")]).await.unwrap();

        let mut changed = profile("a");
        changed.port = 1022;
        storage.upsert(changed).await.unwrap();
        storage.upsert(profile("b")).await.unwrap();

        let loaded = storage.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].port, 1022);
    }

    #[test]
    fn test_strip_comments() {
        assert_eq!(strip_comments("# a\n[1]\n   # b\n"), "[1]");
    }
}
