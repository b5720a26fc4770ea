//! Local ↔ remote path mapping
//!
//! Given a path in one pane and the configured base directory of each pane,
//! compute the corresponding path in the other pane:
//!
//! ```text
//!   /home/u/site/css/app.css   (local base  /home/u/site)
//!                 └──────┬──────┘
//!                  relative: css/app.css
//!                        │
//!   /var/www/site/css/app.css  (remote base /var/www/site)
//! ```
//!
//! When the path is outside its base, the last segment of the base is looked
//! up among the path's segments and everything after it is used. Failing
//! that, only the final segment of the path is carried over; that last
//! resort is reported as [`MappingOrigin::Fallback`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::sftp::path_utils::{
    collapse_separators, is_separator, last_segment, split_segments, trim_trailing_separators,
    REMOTE_SEPARATOR,
};

/// Which pane a path belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathSide {
    Local,
    Remote,
}

impl PathSide {
    pub fn separator(self) -> char {
        match self {
            PathSide::Local => std::path::MAIN_SEPARATOR,
            PathSide::Remote => REMOTE_SEPARATOR,
        }
    }

    pub fn other(self) -> PathSide {
        match self {
            PathSide::Local => PathSide::Remote,
            PathSide::Remote => PathSide::Local,
        }
    }
}

/// How the relative part of a mapping was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingOrigin {
    /// The source path is inside the source base
    WithinBase,
    /// Reconstructed from the base's last segment found inside the path
    Anchored,
    /// Only the path's final segment was carried over
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapping {
    pub path: String,
    pub origin: MappingOrigin,
}

/// Base directories of the two panes. Synchronization is enabled only when
/// both are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasePathPair {
    pub local_base: String,
    pub remote_base: String,
}

impl BasePathPair {
    pub fn new(local_base: impl Into<String>, remote_base: impl Into<String>) -> Self {
        Self {
            local_base: local_base.into(),
            remote_base: remote_base.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.local_base.is_empty() && !self.remote_base.is_empty()
    }

    pub fn base(&self, side: PathSide) -> &str {
        match side {
            PathSide::Local => &self.local_base,
            PathSide::Remote => &self.remote_base,
        }
    }

    /// Full mapping of a path on `side` into the other pane
    pub fn map_to_other(&self, path: &str, side: PathSide) -> Option<PathMapping> {
        map_path_detailed(path, self.base(side), self.base(side.other()), side.other())
    }

    /// Mapping that only applies while `path` stays inside its base
    pub fn map_within_base(&self, path: &str, side: PathSide) -> Option<String> {
        map_path_within_base(path, self.base(side), self.base(side.other()), side.other())
    }
}

/// Map `source_path` (in the pane rooted at `source_base`) to the
/// corresponding path under `target_base`.
pub fn map_path(
    source_path: &str,
    source_base: &str,
    target_base: &str,
    target_side: PathSide,
) -> Option<String> {
    map_path_detailed(source_path, source_base, target_base, target_side).map(|m| m.path)
}

/// [`map_path`], also reporting how the relative part was derived
pub fn map_path_detailed(
    source_path: &str,
    source_base: &str,
    target_base: &str,
    target_side: PathSide,
) -> Option<PathMapping> {
    if source_base.is_empty() || target_base.is_empty() {
        return None;
    }

    let base = trim_trailing_separators(source_base);
    let path = trim_trailing_separators(source_path);

    if let Some(relative) = strip_base(path, base) {
        return Some(PathMapping {
            path: join_onto_base(target_base, relative, target_side),
            origin: MappingOrigin::WithinBase,
        });
    }

    let segments: Vec<&str> = split_segments(path).collect();
    let anchor_index = last_segment(base)
        .and_then(|anchor| segments.iter().position(|segment| *segment == anchor));

    let (relative, origin) = match anchor_index {
        Some(index) => (segments[index + 1..].join("/"), MappingOrigin::Anchored),
        None => {
            let name = segments.last().copied().unwrap_or_default();
            warn!(
                "Cannot relate {} to base {}, carrying over only {:?}",
                source_path, source_base, name
            );
            (name.to_string(), MappingOrigin::Fallback)
        }
    };

    let mapped = join_onto_base(target_base, &relative, target_side);
    debug!("Mapped {} -> {} ({:?})", source_path, mapped, origin);

    Some(PathMapping {
        path: mapped,
        origin,
    })
}

/// Map only when `source_path` is inside `source_base`; `None` otherwise
pub fn map_path_within_base(
    source_path: &str,
    source_base: &str,
    target_base: &str,
    target_side: PathSide,
) -> Option<String> {
    if source_base.is_empty() || target_base.is_empty() {
        return None;
    }

    let base = trim_trailing_separators(source_base);
    let path = trim_trailing_separators(source_path);

    strip_base(path, base).map(|relative| join_onto_base(target_base, relative, target_side))
}

/// Remainder of `path` after `base`, without leading separators. `None` when
/// `path` is not `base` itself or below it.
///
/// The match is on whole segments, not a plain textual prefix: `/var/www2`
/// is outside `/var/www` and goes through the anchor lookup instead of
/// mapping to `<target>/2`.
fn strip_base<'a>(path: &'a str, base: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(base)?;

    // "/var/www2" is not inside "/var/www"
    if rest.is_empty() || rest.starts_with(is_separator) || base.ends_with(is_separator) {
        Some(rest.trim_start_matches(is_separator))
    } else {
        None
    }
}

fn join_onto_base(target_base: &str, relative: &str, target_side: PathSide) -> String {
    let segments: Vec<&str> = split_segments(relative).collect();
    if segments.is_empty() {
        return target_base.to_string();
    }

    let separator = target_side.separator();
    let mut joined = trim_trailing_separators(target_base).to_string();
    for segment in segments {
        if !joined.ends_with(is_separator) {
            joined.push(separator);
        }
        joined.push_str(segment);
    }

    match target_side {
        PathSide::Remote => collapse_separators(&joined, REMOTE_SEPARATOR),
        PathSide::Local => joined,
    }
}
