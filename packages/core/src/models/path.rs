//! Materialized Path Helpers
//!
//! A node's position in its tree is encoded as a string of ancestor ids
//! (including the node's own id) joined by [`PATH_SEPARATOR`], from the true
//! root down to the node. Depth is the segment count minus one, so a root has
//! level 0.
//!
//! Subtree queries become prefix scans: every descendant of a node with path
//! `P` has a path starting with `P` followed by the separator.

use crate::models::node::NodeId;

/// Separator between id segments in a materialized path.
pub const PATH_SEPARATOR: char = '-';

/// Compose a node's path from its parent's path and its own persisted id.
///
/// A root node (no parent path) is encoded as just its own id.
pub fn compose(parent_path: Option<&str>, id: NodeId) -> String {
    match parent_path {
        Some(parent) => format!("{parent}{PATH_SEPARATOR}{id}"),
        None => id.to_string(),
    }
}

/// Depth encoded in a path: segment count minus one (root = 0).
pub fn level_of(path: &str) -> i32 {
    path.split(PATH_SEPARATOR).count() as i32 - 1
}

/// Whether `id` occurs as a full segment of `path`.
///
/// Used for cycle detection on move: a substring test would miss the id in
/// the first segment and match partial ids (`"1"` inside `"12"`).
pub fn contains_segment(path: &str, id: NodeId) -> bool {
    let needle = id.to_string();
    path.split(PATH_SEPARATOR).any(|segment| segment == needle)
}

/// The prefix shared by every descendant path of `path`.
pub fn descendant_prefix(path: &str) -> String {
    format!("{path}{PATH_SEPARATOR}")
}

/// Replace the leading `old_prefix` of `path` with `new_prefix`.
///
/// Caller guarantees `path` starts with `old_prefix` (descendants are loaded
/// by prefix scan before being rebased).
pub fn rebase(path: &str, old_prefix: &str, new_prefix: &str) -> String {
    debug_assert!(path.starts_with(old_prefix));
    format!("{new_prefix}{}", &path[old_prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_root() {
        assert_eq!(compose(None, NodeId(7)), "7");
    }

    #[test]
    fn test_compose_child() {
        assert_eq!(compose(Some("7-12"), NodeId(35)), "7-12-35");
    }

    #[test]
    fn test_level_of() {
        assert_eq!(level_of("7"), 0);
        assert_eq!(level_of("7-12"), 1);
        assert_eq!(level_of("7-12-35"), 2);
    }

    #[test]
    fn test_contains_segment_matches_whole_segments_only() {
        assert!(contains_segment("7-12-35", NodeId(12)));
        assert!(contains_segment("7-12-35", NodeId(7)));
        assert!(contains_segment("7-12-35", NodeId(35)));
        // "1" is a substring of "12" but not a segment
        assert!(!contains_segment("7-12-35", NodeId(1)));
        assert!(!contains_segment("7-12-35", NodeId(2)));
    }

    #[test]
    fn test_rebase() {
        assert_eq!(rebase("7-12-35", "7-12", "9"), "9-35");
        assert_eq!(rebase("7-12-35-40", "7-12", "9-2"), "9-2-35-40");
    }

    #[test]
    fn test_descendant_prefix() {
        assert_eq!(descendant_prefix("7-12"), "7-12-");
    }
}
