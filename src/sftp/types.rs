//! SFTP data types

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// One entry of a directory listing, local or remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    /// File name (not full path)
    pub name: String,
    /// Full path
    pub path: String,
    pub is_directory: bool,
    /// File size in bytes
    pub size: u64,
    /// Last modified time (Unix timestamp)
    pub modified: i64,
    /// Mode bits
    pub permissions: u32,
}

impl DirectoryEntry {
    /// Octal rendering of the permission bits, e.g. `"755"`
    pub fn permissions_octal(&self) -> String {
        format!("{:o}", self.permissions & 0o777)
    }
}

/// Listing order shared by both panes: directories first, then by name
/// (case-insensitive, ties broken case-sensitively).
pub fn compare_entries(a: &DirectoryEntry, b: &DirectoryEntry) -> Ordering {
    b.is_directory
        .cmp(&a.is_directory)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

pub fn sort_entries(entries: &mut [DirectoryEntry]) {
    entries.sort_by(compare_entries);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, is_directory: bool) -> DirectoryEntry {
        DirectoryEntry {
            name: name.to_string(),
            path: format!("/srv/{}", name),
            is_directory,
            size: 0,
            modified: 0,
            permissions: 0o644,
        }
    }

    #[test]
    fn test_directories_first_then_name() {
        let mut entries = vec![
            entry("b.txt", false),
            entry("Zeta", true),
            entry("a.txt", false),
            entry("alpha", true),
        ];
        sort_entries(&mut entries);

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["alpha", "Zeta", "a.txt", "b.txt"]);
    }

    #[test]
    fn test_case_only_difference_is_stable() {
        let mut entries = vec![entry("readme", false), entry("README", false)];
        sort_entries(&mut entries);
        assert_eq!(entries[0].name, "README");
    }

    #[test]
    fn test_permissions_octal() {
        let mut e = entry("x", false);
        e.permissions = 0o100755;
        assert_eq!(e.permissions_octal(), "755");
    }
}
