//! Synchronized navigation between the local and remote panes
//!
//! A [`PanePair`] tracks the current directory of both panes. Moving one pane
//! moves the other to the corresponding location when base directories are
//! configured:
//!
//! | Event       | Inside base | Outside base          |
//! |-------------|-------------|-----------------------|
//! | `Open`      | mapped      | anchored / fallback   |
//! | `Up`        | mapped      | other pane stays      |
//! | `PathEntry` | mapped      | other pane stays      |

pub mod path_mapper;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub use path_mapper::{
    map_path, map_path_detailed, map_path_within_base, BasePathPair, MappingOrigin, PathMapping,
    PathSide,
};

use crate::sftp::path_utils::{is_separator, last_segment, trim_trailing_separators};

/// How a pane arrived at its new directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationEvent {
    /// Entered a subdirectory from the listing
    Open,
    /// Went to the parent directory
    Up,
    /// Typed into the path bar
    PathEntry,
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Path is empty")]
    Empty,

    #[error("Cannot open {path}: {reason}")]
    Unreachable { path: String, reason: String },
}

impl Serialize for PathError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Current directories of both panes plus their bases
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanePair {
    pub bases: BasePathPair,
    pub local_path: String,
    pub remote_path: String,
}

impl PanePair {
    /// Both panes start at their base directory
    pub fn new(bases: BasePathPair) -> Self {
        Self {
            local_path: bases.local_base.clone(),
            remote_path: bases.remote_base.clone(),
            bases,
        }
    }

    pub fn current(&self, side: PathSide) -> &str {
        match side {
            PathSide::Local => &self.local_path,
            PathSide::Remote => &self.remote_path,
        }
    }

    fn set_current(&mut self, side: PathSide, path: String) {
        match side {
            PathSide::Local => self.local_path = path,
            PathSide::Remote => self.remote_path = path,
        }
    }

    /// Move the pane on `side` to `path` and, when applicable, the other
    /// pane to the corresponding location. Returns the other pane's new path
    /// if it moved.
    pub fn navigate(
        &mut self,
        side: PathSide,
        path: impl Into<String>,
        event: NavigationEvent,
    ) -> Option<String> {
        let path = path.into();

        let synced = match event {
            NavigationEvent::Open => self.bases.map_to_other(&path, side).map(|m| m.path),
            NavigationEvent::Up | NavigationEvent::PathEntry => {
                self.bases.map_within_base(&path, side)
            }
        };

        debug!("{:?} {:?} -> {}", side, event, path);
        self.set_current(side, path);

        if let Some(ref other) = synced {
            info!("Syncing {:?} pane to {}", side.other(), other);
            self.set_current(side.other(), other.clone());
        }

        synced
    }

    /// Go to the parent of the pane on `side`
    pub fn go_up(&mut self, side: PathSide) -> Option<String> {
        let parent = parent_path(self.current(side), side);
        self.navigate(side, parent, NavigationEvent::Up)
    }

    /// The path on the other pane that corresponds to `path` on `side`, for
    /// operations that act on both trees at once. Outside the bases (or
    /// without them) this is the entry's name under the other pane's current
    /// directory.
    pub fn counterpart(&self, side: PathSide, path: &str) -> String {
        if let Some(mapped) = self.bases.map_within_base(path, side) {
            return mapped;
        }

        let other = side.other();
        let name = last_segment(path).unwrap_or_default();
        let dir = trim_trailing_separators(self.current(other));
        if dir.ends_with(is_separator) {
            format!("{}{}", dir, name)
        } else {
            format!("{}{}{}", dir, other.separator(), name)
        }
    }
}

/// Parent directory: drop the last segment, `/` when nothing remains
pub fn parent_path(path: &str, side: PathSide) -> String {
    let trimmed = trim_trailing_separators(path);
    let cut = match side {
        PathSide::Remote => trimmed.rfind('/'),
        PathSide::Local => trimmed.rfind(is_separator),
    };

    match cut {
        Some(index) if index > 0 => trimmed[..index].to_string(),
        _ => "/".to_string(),
    }
}

/// Outcome of deleting an entry from both panes; each side succeeds or
/// fails independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DualDeleteReport {
    pub local_path: String,
    pub remote_path: String,
    pub local_error: Option<String>,
    pub remote_error: Option<String>,
}

impl DualDeleteReport {
    pub fn local_deleted(&self) -> bool {
        self.local_error.is_none()
    }

    pub fn remote_deleted(&self) -> bool {
        self.remote_error.is_none()
    }

    pub fn fully_deleted(&self) -> bool {
        self.local_deleted() && self.remote_deleted()
    }

    /// Failures prefixed with their side, e.g. `Remote: ...`
    pub fn errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(ref e) = self.local_error {
            errors.push(format!("Local: {}", e));
        }
        if let Some(ref e) = self.remote_error {
            errors.push(format!("Remote: {}", e));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> PanePair {
        PanePair::new(BasePathPair::new("/home/u/site", "/var/www/site"))
    }

    #[test]
    fn test_open_syncs_other_pane() {
        let mut panes = pair();

        let synced = panes.navigate(PathSide::Local, "/home/u/site/css", NavigationEvent::Open);

        assert_eq!(synced.as_deref(), Some("/var/www/site/css"));
        assert_eq!(panes.remote_path, "/var/www/site/css");
        assert_eq!(panes.local_path, "/home/u/site/css");
    }

    #[test]
    fn test_open_outside_base_uses_heuristic() {
        let mut panes = pair();

        panes.navigate(PathSide::Remote, "/srv/logs", NavigationEvent::Open);

        assert_eq!(panes.local_path, "/home/u/site/logs");
    }

    #[test]
    fn test_up_outside_base_does_not_sync() {
        let mut panes = pair();

        let synced = panes.go_up(PathSide::Remote);

        assert_eq!(synced, None);
        assert_eq!(panes.remote_path, "/var/www");
        assert_eq!(panes.local_path, "/home/u/site");
    }

    #[test]
    fn test_up_inside_base_syncs() {
        let mut panes = pair();
        panes.navigate(PathSide::Local, "/home/u/site/a/b", NavigationEvent::Open);

        let synced = panes.go_up(PathSide::Local);

        assert_eq!(synced.as_deref(), Some("/var/www/site/a"));
    }

    #[test]
    fn test_no_sync_without_bases() {
        let mut panes = PanePair::new(BasePathPair::new("/home/u", ""));
        panes.remote_path = "/".to_string();

        let synced = panes.navigate(PathSide::Local, "/home/u/x", NavigationEvent::Open);

        assert_eq!(synced, None);
        assert_eq!(panes.remote_path, "/");
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("/var/www/site", PathSide::Remote), "/var/www");
        assert_eq!(parent_path("/var/", PathSide::Remote), "/");
        assert_eq!(parent_path("/", PathSide::Remote), "/");
        assert_eq!(parent_path("relative", PathSide::Local), "/");
    }

    #[test]
    fn test_counterpart() {
        let mut panes = pair();
        assert_eq!(
            panes.counterpart(PathSide::Local, "/home/u/site/index.html"),
            "/var/www/site/index.html"
        );

        panes.remote_path = "/tmp".to_string();
        assert_eq!(panes.counterpart(PathSide::Local, "/elsewhere/notes.txt"), "/tmp/notes.txt");
    }

    #[test]
    fn test_dual_delete_report() {
        let report = DualDeleteReport {
            local_path: "/l".into(),
            remote_path: "/r".into(),
            local_error: None,
            remote_error: Some("Permission denied".into()),
        };

        assert!(report.local_deleted());
        assert!(!report.fully_deleted());
        assert_eq!(report.errors(), ["Remote: Permission denied"]);
    }
}
