//! Ordered content signatures and replica equality.

use super::hash::{assign_hashes, node_hash};
use super::normalize::{is_system_root, is_top_root, CanonicalRole};
use super::TreeNode;

/// Pre-order content signature of a tree.
///
/// Bookmarks contribute `B|<hash>`, folders `F|<title>|<child count>`.
/// System roots contribute nothing themselves; top-level roots are walked in
/// canonical-role order and roots with no role mapping are skipped, so the
/// same content on Chromium and Firefox yields the same sequence.
pub fn extract_signatures(root: &TreeNode) -> Vec<String> {
    let mut out = Vec::new();

    if is_top_root(root) {
        let mut roots: Vec<(CanonicalRole, &TreeNode)> = root
            .children()
            .iter()
            .filter(|child| is_system_root(child))
            .filter_map(|child| CanonicalRole::of(child).map(|role| (role, child)))
            .collect();
        roots.sort_by_key(|(role, _)| *role);

        for (_, system_root) in roots {
            walk(system_root, &mut out);
        }
        for child in root.children().iter().filter(|c| !is_system_root(c)) {
            walk(child, &mut out);
        }
    } else {
        walk(root, &mut out);
    }

    out
}

fn walk(node: &TreeNode, out: &mut Vec<String>) {
    if node.is_bookmark() {
        let hash = node.content_hash.clone().or_else(|| node_hash(node));
        out.push(format!("B|{}", hash.unwrap_or_default()));
        return;
    }

    if !is_system_root(node) {
        out.push(format!("F|{}|{}", node.title, node.children().len()));
    }
    for child in node.children() {
        walk(child, out);
    }
}

/// True when both trees carry the same content in the same order.
///
/// The local tree is minimized and hashed first so local ids never take
/// part. Reordering alone counts as a difference.
pub fn compare(local: &TreeNode, remote: &TreeNode) -> bool {
    let local_signatures = extract_signatures(&assign_hashes(local));
    let remote_signatures = extract_signatures(remote);

    local_signatures.len() == remote_signatures.len()
        && local_signatures
            .iter()
            .zip(remote_signatures.iter())
            .all(|(a, b)| a == b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chromium_tree(first: &str, second: &str) -> TreeNode {
        TreeNode::folder("").with_id("0").with_children(vec![
            TreeNode::folder("Bookmarks bar")
                .with_id("1")
                .with_role("bookmarks-bar")
                .with_children(vec![
                    TreeNode::bookmark(first, &format!("https://{first}.com")).with_id("10"),
                    TreeNode::folder("Work").with_id("11").with_children(vec![
                        TreeNode::bookmark(second, &format!("https://{second}.com")).with_id("12"),
                    ]),
                ]),
            TreeNode::folder("Other bookmarks").with_id("2").with_role("other"),
        ])
    }

    #[test]
    fn test_signatures_skip_system_roots() {
        let signatures = extract_signatures(&chromium_tree("a", "b"));
        assert_eq!(signatures.len(), 3);
        assert!(signatures[0].starts_with("B|"));
        assert_eq!(signatures[1], "F|Work|1");
        assert!(signatures[2].starts_with("B|"));
    }

    #[test]
    fn test_compare_is_reflexive() {
        let tree = chromium_tree("a", "b");
        assert!(compare(&tree, &assign_hashes(&tree)));
        assert!(compare(&tree, &tree));
    }

    #[test]
    fn test_compare_detects_reordering() {
        let tree = chromium_tree("a", "b");
        let mut reordered = tree.clone();
        let bar = &mut reordered.children.as_mut().unwrap()[0];
        bar.children.as_mut().unwrap().reverse();
        assert!(!compare(&tree, &reordered));
    }

    #[test]
    fn test_compare_detects_changed_title() {
        assert!(!compare(&chromium_tree("a", "b"), &chromium_tree("a", "c")));
    }

    #[test]
    fn test_compare_matches_across_replica_kinds() {
        let chromium = chromium_tree("a", "b");
        let firefox = TreeNode::folder("").with_id("root________").with_children(vec![
            TreeNode::folder("Bookmarks Menu")
                .with_role("menu________")
                .with_children(vec![TreeNode::bookmark("menu only", "https://menu.example")]),
            TreeNode::folder("Bookmarks Toolbar")
                .with_role("toolbar_____")
                .with_children(vec![
                    TreeNode::bookmark("a", "https://a.com/"),
                    TreeNode::folder("Work")
                        .with_children(vec![TreeNode::bookmark("b", "https://b.com")]),
                ]),
            TreeNode::folder("Other Bookmarks").with_role("unfiled_____"),
        ]);
        assert!(compare(&chromium, &firefox));
    }
}
