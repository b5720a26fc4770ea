//! Path helpers shared by the SFTP layer and the path mapper
//!
//! Remote SFTP paths always use `/` (per SFTP protocol), even against Windows
//! servers. Local paths use the platform separator but may arrive with either
//! `/` or `\` when typed into a path bar, so splitting accepts both.

/// Separator used when building remote paths
pub const REMOTE_SEPARATOR: char = '/';

/// Check if a remote SFTP path is absolute.
pub fn is_absolute_remote_path(path: &str) -> bool {
    path.starts_with(REMOTE_SEPARATOR)
}

/// Join remote SFTP path components using `/` separator.
pub fn join_remote_path(base: &str, component: &str) -> String {
    if base.ends_with(REMOTE_SEPARATOR) {
        format!("{}{}", base, component)
    } else {
        format!("{}/{}", base, component)
    }
}

pub fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Strip trailing separators, keeping a lone root separator intact
pub fn trim_trailing_separators(path: &str) -> &str {
    let trimmed = path.trim_end_matches(is_separator);
    if trimmed.is_empty() && !path.is_empty() {
        &path[..1]
    } else {
        trimmed
    }
}

/// Non-empty segments of a path, splitting on both `/` and `\`
pub fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(is_separator).filter(|s| !s.is_empty())
}

/// Last non-empty segment of a path
pub fn last_segment(path: &str) -> Option<&str> {
    split_segments(path).last()
}

/// Replace runs of `separator` with a single one
pub fn collapse_separators(path: &str, separator: char) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_was_separator = false;
    for c in path.chars() {
        if c == separator {
            if !previous_was_separator {
                out.push(c);
            }
            previous_was_separator = true;
        } else {
            out.push(c);
            previous_was_separator = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_absolute_remote_path() {
        assert!(is_absolute_remote_path("/home/user"));
        assert!(is_absolute_remote_path("/"));
        assert!(!is_absolute_remote_path("relative/path"));
        assert!(!is_absolute_remote_path("C:\\Windows"));
    }

    #[test]
    fn test_join_remote_path() {
        assert_eq!(join_remote_path("/home", "file.txt"), "/home/file.txt");
        assert_eq!(join_remote_path("/home/", "file.txt"), "/home/file.txt");
        assert_eq!(join_remote_path("/", "home"), "/home");
    }

    #[test]
    fn test_trim_trailing_separators() {
        assert_eq!(trim_trailing_separators("/var/www/"), "/var/www");
        assert_eq!(trim_trailing_separators("C:\\site\\\\"), "C:\\site");
        assert_eq!(trim_trailing_separators("/"), "/");
        assert_eq!(trim_trailing_separators(""), "");
    }

    #[test]
    fn test_segments_accept_both_separators() {
        let segments: Vec<_> = split_segments("C:\\Users\\me/site//css").collect();
        assert_eq!(segments, ["C:", "Users", "me", "site", "css"]);
        assert_eq!(last_segment("/home/u/site/"), Some("site"));
        assert_eq!(last_segment("/"), None);
    }

    #[test]
    fn test_collapse_separators() {
        assert_eq!(collapse_separators("/var//www///a", '/'), "/var/www/a");
        assert_eq!(collapse_separators("a\\\\b", '\\'), "a\\b");
    }
}
