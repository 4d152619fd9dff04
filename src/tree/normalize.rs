//! URL canonicalization and system-root identity across replica kinds.
//!
//! Ordinary nodes have no identity shared between browsers. System roots do,
//! but each browser spells them differently: Chromium marks them with a
//! folder type, Firefox with fixed GUIDs. [`CanonicalRole`] is the common
//! vocabulary the rest of the engine uses to line them up.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::TreeNode;

/// Ids of the anonymous top root on each replica kind.
const TOP_ROOT_IDS: &[&str] = &["0", "root________"];

/// Every id that names a system root on some replica kind.
const SYSTEM_ROOT_IDS: &[&str] = &[
    "0",
    "1",
    "2",
    "3",
    "root________",
    "toolbar_____",
    "unfiled_____",
    "mobile______",
    "menu________",
];

/// The browser family whose native tree we are synchronizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaKind {
    /// Chrome, Edge, Brave and friends.
    #[default]
    Chromium,
    /// Firefox and its forks.
    Firefox,
}

impl ReplicaKind {
    /// Returns a human-readable string representation
    pub fn as_str(&self) -> &str {
        match self {
            ReplicaKind::Chromium => "chromium",
            ReplicaKind::Firefox => "firefox",
        }
    }

    /// The id given to the anonymous top root.
    pub fn top_root_id(&self) -> &'static str {
        match self {
            ReplicaKind::Chromium => "0",
            ReplicaKind::Firefox => "root________",
        }
    }

    /// The system roots this replica kind starts with, in native order.
    ///
    /// Each entry is `(id, role tag, default title)`.
    pub fn default_roots(&self) -> &'static [(&'static str, &'static str, &'static str)] {
        match self {
            ReplicaKind::Chromium => &[
                ("1", "bookmarks-bar", "Bookmarks bar"),
                ("2", "other", "Other bookmarks"),
                ("3", "mobile", "Mobile bookmarks"),
            ],
            ReplicaKind::Firefox => &[
                ("menu________", "menu________", "Bookmarks Menu"),
                ("toolbar_____", "toolbar_____", "Bookmarks Toolbar"),
                ("unfiled_____", "unfiled_____", "Other Bookmarks"),
                ("mobile______", "mobile______", "Mobile Bookmarks"),
            ],
        }
    }
}

impl fmt::Display for ReplicaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReplicaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(ReplicaKind::Chromium),
            "firefox" => Ok(ReplicaKind::Firefox),
            other => Err(format!("unknown browser family '{other}' (expected chromium or firefox)")),
        }
    }
}

/// Replica-independent meaning of a system root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalRole {
    /// Bookmarks bar / toolbar.
    Toolbar,
    /// Other / unfiled bookmarks.
    Other,
    /// Mobile bookmarks.
    Mobile,
}

impl CanonicalRole {
    /// All roles, in the order replicas are walked.
    pub const ALL: [CanonicalRole; 3] = [
        CanonicalRole::Toolbar,
        CanonicalRole::Other,
        CanonicalRole::Mobile,
    ];

    /// Looks up the role for a replica-specific tag or well-known root id.
    /// Unmapped tags (Firefox's menu, Chromium's managed folder) yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "bookmarks-bar" | "toolbar_____" | "toolbar" | "1" => Some(CanonicalRole::Toolbar),
            "other" | "unfiled_____" | "unfiled" | "2" => Some(CanonicalRole::Other),
            "mobile" | "mobile______" | "3" => Some(CanonicalRole::Mobile),
            _ => None,
        }
    }

    /// The tag this role carries on the given replica kind.
    pub fn tag_for(&self, kind: ReplicaKind) -> &'static str {
        match (self, kind) {
            (CanonicalRole::Toolbar, ReplicaKind::Chromium) => "bookmarks-bar",
            (CanonicalRole::Other, ReplicaKind::Chromium) => "other",
            (CanonicalRole::Mobile, ReplicaKind::Chromium) => "mobile",
            (CanonicalRole::Toolbar, ReplicaKind::Firefox) => "toolbar_____",
            (CanonicalRole::Other, ReplicaKind::Firefox) => "unfiled_____",
            (CanonicalRole::Mobile, ReplicaKind::Firefox) => "mobile______",
        }
    }

    /// Stable name used as the first segment of folder paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalRole::Toolbar => "toolbar",
            CanonicalRole::Other => "other",
            CanonicalRole::Mobile => "mobile",
        }
    }

    /// Role of a system root node, by tag first and by well-known id second.
    pub fn of(node: &TreeNode) -> Option<Self> {
        if let Some(tag) = node.role_tag.as_deref() {
            return Self::from_tag(tag);
        }
        node.id.as_deref().and_then(Self::from_tag)
    }
}

/// Canonical form of a URL for identity purposes.
///
/// Trims whitespace, strips trailing slashes and lower-cases the scheme.
/// Host and path case are left alone.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    match trimmed.find("://") {
        Some(pos) => format!("{}{}", trimmed[..pos].to_ascii_lowercase(), &trimmed[pos..]),
        None => trimmed.to_string(),
    }
}

/// True for the top root, any node with a role tag, or a well-known root id.
pub fn is_system_root(node: &TreeNode) -> bool {
    if node.url.is_some() {
        return false;
    }
    if node.role_tag.is_some() {
        return true;
    }
    match node.id.as_deref() {
        Some(id) => SYSTEM_ROOT_IDS.contains(&id),
        None => false,
    }
}

/// True for the anonymous root that holds the system roots.
pub fn is_top_root(node: &TreeNode) -> bool {
    match node.id.as_deref() {
        Some(id) => TOP_ROOT_IDS.contains(&id),
        None => node.parent_id.is_none() && node.url.is_none() && node.title.is_empty(),
    }
}

/// Finds the local root corresponding to a remote one.
///
/// Tries role-tag equality, then mapped-role equality, then literal title
/// equality. `None` means the caller must skip this root.
pub fn find_matching_root<'a>(remote_root: &TreeNode, local_roots: &'a [TreeNode]) -> Option<&'a TreeNode> {
    if let Some(tag) = remote_root.role_tag.as_deref() {
        if let Some(found) = local_roots
            .iter()
            .find(|local| local.role_tag.as_deref() == Some(tag))
        {
            return Some(found);
        }
    }

    if let Some(role) = CanonicalRole::of(remote_root) {
        if let Some(found) = local_roots
            .iter()
            .find(|local| CanonicalRole::of(local) == Some(role))
        {
            return Some(found);
        }
    }

    local_roots
        .iter()
        .find(|local| local.url.is_none() && local.title == remote_root.title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://a.com/", "https://a.com")]
    #[case("  https://a.com//  ", "https://a.com")]
    #[case("HTTPS://Example.com/Path/", "https://Example.com/Path")]
    #[case("https://a.com/?q=1", "https://a.com/?q=1")]
    #[case("about:blank", "about:blank")]
    fn test_normalizes_urls(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_url(input), expected);
    }

    #[test]
    fn test_role_mapping_is_bidirectional() {
        for kind in [ReplicaKind::Chromium, ReplicaKind::Firefox] {
            for role in CanonicalRole::ALL {
                assert_eq!(CanonicalRole::from_tag(role.tag_for(kind)), Some(role));
            }
        }
        assert_eq!(CanonicalRole::from_tag("menu________"), None);
    }

    #[test]
    fn test_detects_system_roots() {
        assert!(is_system_root(&TreeNode::folder("Toolbar").with_role("toolbar_____")));
        assert!(is_system_root(&TreeNode::folder("").with_id("0")));
        assert!(!is_system_root(&TreeNode::folder("Work").with_id("117")));
        assert!(!is_system_root(&TreeNode::bookmark("A", "https://a.com").with_id("1")));
    }

    #[test]
    fn test_matches_roots_across_replicas() {
        let local = vec![
            TreeNode::folder("Bookmarks bar").with_id("1").with_role("bookmarks-bar"),
            TreeNode::folder("Other bookmarks").with_id("2").with_role("other"),
        ];

        let remote = TreeNode::folder("Bookmarks Toolbar").with_role("toolbar_____");
        let found = find_matching_root(&remote, &local).unwrap();
        assert_eq!(found.id.as_deref(), Some("1"));

        let remote = TreeNode::folder("Other bookmarks");
        let found = find_matching_root(&remote, &local).unwrap();
        assert_eq!(found.id.as_deref(), Some("2"));

        let remote = TreeNode::folder("Bookmarks Menu").with_role("menu________");
        assert!(find_matching_root(&remote, &local).is_none());
    }

    #[test]
    fn test_parses_replica_kind() {
        assert_eq!("Firefox".parse::<ReplicaKind>(), Ok(ReplicaKind::Firefox));
        assert_eq!("chrome".parse::<ReplicaKind>(), Ok(ReplicaKind::Chromium));
        assert!("safari".parse::<ReplicaKind>().is_err());
        assert_eq!(ReplicaKind::Firefox.to_string(), "firefox");
    }
}
