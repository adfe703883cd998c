//! End-to-end scans over synthesized repositories, asserting the full
//! `HistorySize` aggregate: a git bomb, tag chains, submodules, reference
//! selection, and boundary shapes.

use git_shape::{
    analyze::{Analyzer, ScanResult},
    hash::ObjectHash,
    internal::{
        object::types::ObjectType,
        refs::{Polarity, RefGrouper, ReferenceFilter, SelectionRule},
    },
    source::memory::MemorySource,
};

fn scan(source: MemorySource) -> ScanResult {
    Analyzer::new(source, RefGrouper::new()).scan().unwrap()
}

/// A git bomb: one blob, one commit, ten unique trees that expand to 10^10
/// blob paths on checkout. Unique counts stay tiny while the expanded
/// footprint pins the 32-bit blob counter.
#[test]
fn test_git_bomb() {
    let mut src = MemorySource::new();
    let blob = src.add_blob(b"boom!\n");

    let file_names: Vec<String> = (0..10).map(|i| format!("f{i}")).collect();
    let entries: Vec<(u32, &str, ObjectHash)> = file_names
        .iter()
        .map(|n| (0o100644, n.as_str(), blob))
        .collect();
    let mut tree = src.add_tree(&entries);

    let dir_names: Vec<String> = (0..10).map(|i| format!("d{i}")).collect();
    for _ in 0..9 {
        let entries: Vec<(u32, &str, ObjectHash)> = dir_names
            .iter()
            .map(|n| (0o040000, n.as_str(), tree))
            .collect();
        tree = src.add_tree(&entries);
    }

    let commit = src.add_commit(tree, &[], "git bomb\n");
    src.add_reference("refs/heads/master", commit);

    let h = scan(src).history;

    assert_eq!(h.unique_commit_count.value(), 1);
    assert_eq!(h.unique_commit_size.value(), 172);
    assert_eq!(h.max_commit_size.value.value(), 172);
    assert_eq!(
        h.max_commit_size.path_string().as_deref(),
        Some("refs/heads/master")
    );
    assert_eq!(h.max_history_depth.value.value(), 1);
    assert_eq!(h.max_parent_count.value.value(), 0);

    assert_eq!(h.unique_tree_count.value(), 10);
    assert_eq!(h.unique_tree_size.value(), 2910);
    assert_eq!(h.unique_tree_entries.value(), 100);
    assert_eq!(h.max_tree_entries.value.value(), 10);
    assert_eq!(
        h.max_tree_entries.path_string().as_deref(),
        Some("refs/heads/master:d0/d0/d0/d0/d0/d0/d0/d0/d0")
    );

    assert_eq!(h.unique_blob_count.value(), 1);
    assert_eq!(h.unique_blob_size.value(), 6);
    assert_eq!(h.max_blob_size.value.value(), 6);
    assert_eq!(
        h.max_blob_size.path_string().as_deref(),
        Some("refs/heads/master:d0/d0/d0/d0/d0/d0/d0/d0/d0/f0")
    );

    assert_eq!(h.unique_tag_count.value(), 0);
    assert_eq!(h.max_tag_depth.value.value(), 0);
    assert_eq!(h.reference_count.value(), 1);

    assert_eq!(h.max_path_depth.value.value(), 10);
    assert_eq!(h.max_path_length.value.value(), 29);
    assert_eq!(h.max_expanded_tree_count.value.to_u64(), (1_111_111_111, false));
    assert_eq!(h.max_expanded_blob_count.value.to_u64(), (u32::MAX as u64, true));
    assert_eq!(h.max_expanded_blob_size.value.to_u64(), (60_000_000_000, false));
    assert_eq!(h.max_expanded_link_count.value.value(), 0);
    assert_eq!(h.max_expanded_submodule_count.value.value(), 0);
}

/// Three nested annotated tags give the outermost a chain depth of three.
#[test]
fn test_tag_chain_depth() {
    let mut src = MemorySource::new();
    let blob = src.add_blob(b"content\n");
    let tree = src.add_tree(&[(0o100644, "file", blob)]);
    let commit = src.add_commit(tree, &[], "tagged\n");
    let tag1 = src.add_tag(commit, ObjectType::Commit, "wag-inner", "one\n");
    let tag2 = src.add_tag(tag1, ObjectType::Tag, "wag-middle", "two\n");
    let tag3 = src.add_tag(tag2, ObjectType::Tag, "wag", "three\n");
    src.add_reference("refs/tags/wag", tag3);

    let h = scan(src).history;
    assert_eq!(h.unique_tag_count.value(), 3);
    assert_eq!(h.max_tag_depth.value.value(), 3);
    assert_eq!(h.max_tag_depth.path_string().as_deref(), Some("refs/tags/wag"));
    assert_eq!(h.unique_commit_count.value(), 1);
}

/// A lone annotated tag pointing at a commit has depth 1, not 0.
#[test]
fn test_lone_tag_depth() {
    let mut src = MemorySource::new();
    let tree = src.add_tree(&[]);
    let commit = src.add_commit(tree, &[], "tagged\n");
    let tag = src.add_tag(commit, ObjectType::Commit, "v1", "release\n");
    src.add_reference("refs/tags/v1", tag);
    src.add_reference("refs/heads/master", commit);

    let h = scan(src).history;
    assert_eq!(h.unique_tag_count.value(), 1);
    assert_eq!(h.max_tag_depth.value.value(), 1);
    assert_eq!(h.max_tag_depth.path_string().as_deref(), Some("refs/tags/v1"));
}

/// A submodule entry counts as one expanded submodule in the containing
/// repository and contributes nothing else there.
#[test]
fn test_submodule_containing_repository() {
    let mut src = MemorySource::new();
    let blob_file = src.add_blob(b"hello\n");
    let blob_gitmodules =
        src.add_blob(b"[submodule \"sub\"]\n\tpath = sub\n\turl = ../sub.git\n");
    // the gitlink names a commit in another repository
    let foreign_commit = ObjectHash([0x5a; 20]);
    let tree = src.add_tree(&[
        (0o100644, ".gitmodules", blob_gitmodules),
        (0o100644, "a.txt", blob_file),
        (0o160000, "sub", foreign_commit),
    ]);
    let commit = src.add_commit(tree, &[], "add submodule\n");
    src.add_reference("refs/heads/master", commit);

    let h = scan(src).history;
    assert_eq!(h.unique_blob_count.value(), 2);
    assert_eq!(h.max_expanded_blob_count.value.value(), 2);
    assert_eq!(h.max_expanded_submodule_count.value.value(), 1);
    assert_eq!(h.unique_commit_count.value(), 1);
}

/// Scanning the submodule's own repository: two distinct blobs under three
/// file paths.
#[test]
fn test_submodule_inner_repository() {
    let mut src = MemorySource::new();
    let blob_one = src.add_blob(b"one\n");
    let blob_two = src.add_blob(b"two two\n");
    let tree = src.add_tree(&[
        (0o100644, "a.txt", blob_one),
        (0o100644, "b.txt", blob_two),
        (0o100644, "c.txt", blob_one),
    ]);
    let commit = src.add_commit(tree, &[], "submodule content\n");
    src.add_reference("refs/heads/master", commit);

    let h = scan(src).history;
    assert_eq!(h.unique_blob_count.value(), 2);
    assert_eq!(h.max_expanded_blob_count.value.value(), 3);
}

/// The reference selection combination: includes admit, excludes veto, and
/// exactly six of the fourteen references walk.
#[test]
fn test_reference_selection_combination() {
    let refnames = [
        "refs/barfoo",
        "refs/foo",
        "refs/foobar",
        "refs/heads/foo",
        "refs/heads/master",
        "refs/remotes/origin/master",
        "refs/remotes/upstream/foo",
        "refs/remotes/upstream/master",
        "refs/tags/foolish",
        "refs/tags/other",
        "refs/tags/release-1",
        "refs/tags/release-2",
        "refs/notes/discussion",
        "refs/stash",
    ];
    let mut src = MemorySource::new();
    let tree = src.add_tree(&[]);
    for name in refnames {
        let commit = src.add_commit(tree, &[], &format!("tip of {name}\n"));
        src.add_reference(name, commit);
    }

    let include = |filter| SelectionRule {
        polarity: Polarity::Include,
        filter,
    };
    let exclude = |filter| SelectionRule {
        polarity: Polarity::Exclude,
        filter,
    };
    let rules = vec![
        include(ReferenceFilter::prefix("refs/heads")),
        include(ReferenceFilter::prefix("refs/tags")),
        exclude(ReferenceFilter::prefix("refs/heads/foo")),
        include(ReferenceFilter::regexp(".*foo.*").unwrap()),
        exclude(ReferenceFilter::prefix("refs/foo")),
        exclude(ReferenceFilter::regexp("refs/tags/release-.*").unwrap()),
    ];
    let mut grouper = RefGrouper::new();
    grouper.set_top_filter(ReferenceFilter::selection(&rules));

    let result = Analyzer::new(src, grouper).scan().unwrap();
    let h = &result.history;
    // walked: refs/barfoo, refs/foobar, refs/heads/master,
    // refs/remotes/upstream/foo, refs/tags/foolish, refs/tags/other
    assert_eq!(h.reference_count.value(), 6);
    assert_eq!(h.unique_commit_count.value(), 6);

    let count = |symbol: &str| {
        result
            .groups
            .iter()
            .find(|t| t.symbol == symbol)
            .map(|t| t.count.value())
    };
    assert_eq!(count("branches"), Some(1));
    assert_eq!(count("tags"), Some(2));
    assert_eq!(count("remotes"), Some(1));
    assert_eq!(count("other"), Some(2));
    assert_eq!(count("ignored"), Some(8));
}

/// A commit whose tree is empty still checks out one tree of depth one.
#[test]
fn test_empty_tree_commit() {
    let mut src = MemorySource::new();
    let tree = src.add_tree(&[]);
    let commit = src.add_commit(tree, &[], "empty\n");
    src.add_reference("refs/heads/master", commit);

    let h = scan(src).history;
    assert_eq!(h.unique_tree_count.value(), 1);
    assert_eq!(h.unique_tree_entries.value(), 0);
    assert_eq!(h.max_tree_entries.value.value(), 0);
    assert_eq!(h.max_path_depth.value.value(), 1);
    assert_eq!(h.max_path_length.value.value(), 0);
    assert_eq!(h.max_expanded_tree_count.value.value(), 1);
    assert_eq!(h.max_expanded_blob_count.value.value(), 0);
}

/// Ancestry depth follows the longest parent chain and the widest merge is
/// tracked with its path.
#[test]
fn test_history_depth_and_merges() {
    let mut src = MemorySource::new();
    let tree = src.add_tree(&[]);
    let c1 = src.add_commit(tree, &[], "one\n");
    let c2 = src.add_commit(tree, &[c1], "two\n");
    let c3 = src.add_commit(tree, &[c1], "three\n");
    let c4 = src.add_commit(tree, &[c2, c3], "merge\n");
    src.add_reference("refs/heads/main", c4);

    let h = scan(src).history;
    assert_eq!(h.unique_commit_count.value(), 4);
    assert_eq!(h.max_history_depth.value.value(), 3);
    assert_eq!(
        h.max_history_depth.path_string().as_deref(),
        Some("refs/heads/main")
    );
    assert_eq!(h.max_parent_count.value.value(), 2);
    assert_eq!(
        h.max_parent_count.path_string().as_deref(),
        Some("refs/heads/main")
    );
    // one unique tree shared by all four commits
    assert_eq!(h.unique_tree_count.value(), 1);
}

/// Symlink entries count as links, with their name length in the path
/// metrics.
#[test]
fn test_symlink_entries() {
    let mut src = MemorySource::new();
    let target = src.add_blob(b"target-file\n");
    let tree = src.add_tree(&[
        (0o100644, "target-file", target),
        (0o120000, "a-long-symlink-name", target),
    ]);
    let commit = src.add_commit(tree, &[], "links\n");
    src.add_reference("refs/heads/master", commit);

    let h = scan(src).history;
    assert_eq!(h.max_expanded_link_count.value.value(), 1);
    assert_eq!(h.max_expanded_blob_count.value.value(), 1);
    assert_eq!(h.unique_blob_count.value(), 1);
    assert_eq!(h.max_path_length.value.value(), 19);
}

/// The aggregate serializes with value/overflow pairs and rendered extremum
/// paths, the shape the report formatter consumes.
#[test]
fn test_history_size_serialization() {
    let mut src = MemorySource::new();
    let blob = src.add_blob(b"abc\n");
    let tree = src.add_tree(&[(0o100644, "abc.txt", blob)]);
    let commit = src.add_commit(tree, &[], "one\n");
    src.add_reference("refs/heads/master", commit);

    let h = scan(src).history;
    let value = serde_json::to_value(&h).unwrap();
    assert_eq!(value["unique_blob_count"]["value"], 1);
    assert_eq!(value["unique_blob_count"]["overflow"], false);
    assert_eq!(value["max_blob_size"]["value"]["value"], 4);
    assert_eq!(
        value["max_blob_size"]["path"],
        "refs/heads/master:abc.txt"
    );
    assert_eq!(value["max_parent_count"]["path"], serde_json::Value::Null);
}
