use chrono::{TimeZone, Utc};
use rstest::rstest;

use bookmark_sync::backup::BackupFileRecord;
use bookmark_sync::tree::{assign_hashes, compare, extract_signatures, GlobalIndex, TreeNode};

fn chromium_tree(ids: [&str; 4]) -> TreeNode {
    TreeNode::folder("").with_id("0").with_children(vec![
        TreeNode::folder("Bookmarks bar")
            .with_id("1")
            .with_role("bookmarks-bar")
            .with_children(vec![
                TreeNode::bookmark("Rust", "https://www.rust-lang.org").with_id(ids[0]),
                TreeNode::folder("News").with_id(ids[1]).with_children(vec![
                    TreeNode::bookmark("LWN", "https://lwn.net").with_id(ids[2]),
                ]),
            ]),
        TreeNode::folder("Other bookmarks")
            .with_id("2")
            .with_role("other")
            .with_children(vec![TreeNode::bookmark("Docs", "https://docs.rs").with_id(ids[3])]),
    ])
}

fn firefox_tree() -> TreeNode {
    TreeNode::folder("").with_id("root________").with_children(vec![
        TreeNode::folder("Bookmarks Menu")
            .with_id("menu________")
            .with_role("menu________")
            .with_children(vec![TreeNode::bookmark("Menu only", "https://menu.example").with_id("m1")]),
        TreeNode::folder("Bookmarks Toolbar")
            .with_id("toolbar_____")
            .with_role("toolbar_____")
            .with_children(vec![
                TreeNode::bookmark("Rust", "https://www.rust-lang.org/").with_id("a1"),
                TreeNode::folder("News").with_id("a2").with_children(vec![
                    TreeNode::bookmark("LWN", "https://lwn.net").with_id("a3"),
                ]),
            ]),
        TreeNode::folder("Other Bookmarks")
            .with_id("unfiled_____")
            .with_role("unfiled_____")
            .with_children(vec![TreeNode::bookmark("Docs", "https://docs.rs").with_id("a4")]),
    ])
}

#[test]
fn test_compare_is_reflexive() {
    let tree = chromium_tree(["10", "11", "12", "13"]);
    assert!(compare(&tree, &assign_hashes(&tree)));
}

#[test]
fn test_compare_ignores_local_ids() {
    let tree = chromium_tree(["10", "11", "12", "13"]);
    let relabeled = chromium_tree(["200", "201", "202", "203"]);
    assert!(compare(&tree, &assign_hashes(&relabeled)));
}

#[test]
fn test_compare_detects_reordering() {
    let tree = chromium_tree(["10", "11", "12", "13"]);
    let mut reordered = tree.clone();
    if let Some(bar) = reordered.children.as_mut().and_then(|roots| roots.first_mut()) {
        if let Some(children) = bar.children.as_mut() {
            children.reverse();
        }
    }
    assert!(!compare(&tree, &assign_hashes(&reordered)));
}

#[test]
fn test_same_content_matches_across_replica_kinds() {
    let chromium = chromium_tree(["10", "11", "12", "13"]);
    let firefox = firefox_tree();

    // The Firefox menu has no counterpart and is left out of the signature.
    assert_eq!(
        extract_signatures(&assign_hashes(&chromium)),
        extract_signatures(&assign_hashes(&firefox))
    );
    assert!(compare(&firefox, &assign_hashes(&chromium)));
}

#[test]
fn test_index_finds_bookmarks_by_normalized_url() {
    let index = GlobalIndex::build(&firefox_tree());
    assert_eq!(index.by_url("https://www.rust-lang.org").len(), 1);
    assert_eq!(index.bookmark_count(), 4);
    assert_eq!(index.folder_at("toolbar/News").map(|f| f.id.as_str()), Some("a2"));
    assert!(index.is_within("a3", "toolbar_____"));
}

#[rstest]
#[case("laptop", 0, true)]
#[case("work-desktop", 1234, false)]
#[case("a", 7, true)]
fn test_backup_file_name_round_trip(#[case] label: &str, #[case] count: usize, #[case] compressed: bool) {
    let timestamp = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 58).unwrap();
    let record = BackupFileRecord::new(timestamp, label, count, compressed);

    let parsed = BackupFileRecord::parse(&record.file_name()).unwrap();
    assert_eq!(parsed, record);

    let next = record.next_revision(timestamp, count + 1, compressed);
    assert_eq!(BackupFileRecord::parse(&next.file_name()).unwrap().revision, 2);
}

#[rstest]
#[case("notes.json")]
#[case("bookmarks_20250101_000000_laptop_3.json")]
#[case("bookmarks_20250101_000000_laptop_3_v0.json")]
#[case("bookmarks_2025_000000_laptop_3_v1.json")]
#[case("bookmarks_20250101_000000_my_laptop_3_v1.json")]
fn test_foreign_names_are_rejected(#[case] name: &str) {
    assert!(BackupFileRecord::parse(name).is_err());
}
