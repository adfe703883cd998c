//! Size records for each object kind and the repository-wide aggregate.
//!
//! `TreeSize`, `CommitSize` and `TagSize` are the recursive metrics that roll
//! up through the object graph; `HistorySize` is the single mutable aggregate
//! the report formatter ultimately receives. All arithmetic saturates; every
//! extremum carries an optional reachability path maintained through the
//! path resolver.

use serde::Serialize;

use crate::{
    counter::{Count32, Count64},
    hash::ObjectHash,
    internal::{
        object::types::ObjectType,
        path::{PathHandle, PathResolver},
    },
};

/// Size of one blob, clamped to 32 bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BlobSize {
    pub size: Count32,
}

impl BlobSize {
    pub fn new(size: u64) -> BlobSize {
        BlobSize {
            size: Count32::new(size),
        }
    }
}

/// Recursive metrics of the checkout rooted at one tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TreeSize {
    /// Deepest path under this tree, in components, counting the leaf.
    pub max_path_depth: Count32,
    /// Longest path under this tree, in bytes, slashes included.
    pub max_path_length: Count32,
    /// Trees in the expanded checkout, this one included.
    pub expanded_tree_count: Count32,
    /// Blobs in the expanded checkout, duplicates counted.
    pub expanded_blob_count: Count32,
    /// Bytes of blob content in the expanded checkout.
    pub expanded_blob_size: Count64,
    /// Symlinks in the expanded checkout.
    pub expanded_link_count: Count32,
    /// Submodule entries in the expanded checkout.
    pub expanded_submodule_count: Count32,
}

impl TreeSize {
    /// Fold a finalized child tree in under an entry whose name is
    /// `name_len` bytes long.
    pub fn add_descendent(&mut self, name_len: usize, child: &TreeSize) {
        self.expanded_tree_count.increment(child.expanded_tree_count);
        self.expanded_blob_count.increment(child.expanded_blob_count);
        self.expanded_blob_size.increment(child.expanded_blob_size);
        self.expanded_link_count.increment(child.expanded_link_count);
        self.expanded_submodule_count
            .increment(child.expanded_submodule_count);
        if child.max_path_depth.value() > 0 {
            self.max_path_depth
                .adjust_max(child.max_path_depth.plus(Count32::new(1)));
        }
        if child.max_path_length.value() > 0 {
            self.max_path_length
                .adjust_max(Count32::new(name_len as u64 + 1).plus(child.max_path_length));
        } else {
            self.max_path_length
                .adjust_max(Count32::new(name_len as u64));
        }
    }

    /// Record a blob entry.
    pub fn add_blob(&mut self, name_len: usize, size: BlobSize) {
        self.expanded_blob_count.increment(Count32::new(1));
        self.expanded_blob_size.increment(Count64::from(size.size));
        self.max_path_depth.adjust_max(Count32::new(1));
        self.max_path_length
            .adjust_max(Count32::new(name_len as u64));
    }

    /// Record a symlink entry.
    pub fn add_link(&mut self, name_len: usize) {
        self.expanded_link_count.increment(Count32::new(1));
        self.max_path_length
            .adjust_max(Count32::new(name_len as u64));
    }

    /// Record a submodule entry.
    pub fn add_submodule(&mut self, name_len: usize) {
        self.expanded_submodule_count.increment(Count32::new(1));
        self.max_path_length
            .adjust_max(Count32::new(name_len as u64));
    }

    /// Account for the tree itself once every entry has been folded in. The
    /// empty tree still is one tree of depth one.
    pub(crate) fn finish(&mut self) {
        self.expanded_tree_count.increment(Count32::new(1));
        self.max_path_depth.adjust_max(Count32::new(1));
    }
}

/// Recursive metrics of one commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CommitSize {
    /// Longest chain of commits from here back to a root commit, this
    /// commit included.
    pub max_ancestor_depth: Count32,
}

/// Depth of the tag chain through one annotated tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TagSize {
    pub tag_depth: Count32,
}

/// A 32-bit extremum with the path of its current winner. Ties keep the
/// earliest winner.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Maximum32 {
    pub value: Count32,
    pub path: Option<PathHandle>,
}

impl Maximum32 {
    fn adjust(
        &mut self,
        resolver: &mut PathResolver,
        oid: ObjectHash,
        object_type: ObjectType,
        candidate: Count32,
    ) {
        if self.value.adjust_max(candidate) {
            if let Some(old) = self.path.take() {
                resolver.forget_path(old);
            }
            self.path = Some(resolver.request_path(oid, object_type));
        }
    }

    /// Rendered path of the current winner, if one is tracked.
    pub fn path_string(&self) -> Option<String> {
        self.path.as_ref().map(|p| p.to_string())
    }
}

/// A 64-bit extremum with the path of its current winner.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Maximum64 {
    pub value: Count64,
    pub path: Option<PathHandle>,
}

impl Maximum64 {
    fn adjust(
        &mut self,
        resolver: &mut PathResolver,
        oid: ObjectHash,
        object_type: ObjectType,
        candidate: Count64,
    ) {
        if self.value.adjust_max(candidate) {
            if let Some(old) = self.path.take() {
                resolver.forget_path(old);
            }
            self.path = Some(resolver.request_path(oid, object_type));
        }
    }

    pub fn path_string(&self) -> Option<String> {
        self.path.as_ref().map(|p| p.to_string())
    }
}

/// The repository-wide aggregate, mutated as each object finalizes.
#[derive(Clone, Debug, Default, Serialize)]
pub struct HistorySize {
    /// Distinct commits walked.
    pub unique_commit_count: Count32,
    /// Total byte size of distinct commit objects.
    pub unique_commit_size: Count64,
    /// Biggest single commit object.
    pub max_commit_size: Maximum32,
    /// Longest commit ancestry chain anywhere in history.
    pub max_history_depth: Maximum32,
    /// Widest merge.
    pub max_parent_count: Maximum32,

    /// Distinct trees walked.
    pub unique_tree_count: Count32,
    /// Total byte size of distinct tree objects.
    pub unique_tree_size: Count64,
    /// Total entries across distinct trees.
    pub unique_tree_entries: Count64,
    /// Widest single tree.
    pub max_tree_entries: Maximum32,

    /// Distinct blobs walked.
    pub unique_blob_count: Count32,
    /// Total byte size of distinct blobs.
    pub unique_blob_size: Count64,
    /// Biggest single blob.
    pub max_blob_size: Maximum32,

    /// Distinct annotated tags walked.
    pub unique_tag_count: Count32,
    /// Total byte size of distinct tag objects.
    pub unique_tag_size: Count64,
    /// Longest chain of annotated tags.
    pub max_tag_depth: Maximum32,

    /// References walked.
    pub reference_count: Count32,

    /// Deepest path in any single checkout.
    pub max_path_depth: Maximum32,
    /// Longest path, in bytes, in any single checkout.
    pub max_path_length: Maximum32,
    /// Most trees in any single expanded checkout.
    pub max_expanded_tree_count: Maximum32,
    /// Most blobs in any single expanded checkout.
    pub max_expanded_blob_count: Maximum32,
    /// Most blob bytes in any single expanded checkout.
    pub max_expanded_blob_size: Maximum64,
    /// Most symlinks in any single expanded checkout.
    pub max_expanded_link_count: Maximum32,
    /// Most submodule entries in any single expanded checkout.
    pub max_expanded_submodule_count: Maximum32,
}

impl HistorySize {
    pub(crate) fn record_reference(&mut self) {
        self.reference_count.increment(Count32::new(1));
    }

    pub(crate) fn record_blob(
        &mut self,
        resolver: &mut PathResolver,
        oid: ObjectHash,
        size: BlobSize,
    ) {
        self.unique_blob_count.increment(Count32::new(1));
        self.unique_blob_size.increment(Count64::from(size.size));
        self.max_blob_size
            .adjust(resolver, oid, ObjectType::Blob, size.size);
    }

    pub(crate) fn record_tree(
        &mut self,
        resolver: &mut PathResolver,
        oid: ObjectHash,
        _size: &TreeSize,
        object_size: Count32,
        entry_count: Count32,
    ) {
        self.unique_tree_count.increment(Count32::new(1));
        self.unique_tree_size.increment(Count64::from(object_size));
        self.unique_tree_entries
            .increment(Count64::from(entry_count));
        self.max_tree_entries
            .adjust(resolver, oid, ObjectType::Tree, entry_count);
    }

    pub(crate) fn record_commit(
        &mut self,
        resolver: &mut PathResolver,
        oid: ObjectHash,
        size: &CommitSize,
        object_size: Count32,
        parent_count: Count32,
        root_tree: &TreeSize,
    ) {
        self.unique_commit_count.increment(Count32::new(1));
        self.unique_commit_size.increment(Count64::from(object_size));
        self.max_commit_size
            .adjust(resolver, oid, ObjectType::Commit, object_size);
        self.max_history_depth
            .adjust(resolver, oid, ObjectType::Commit, size.max_ancestor_depth);
        self.max_parent_count
            .adjust(resolver, oid, ObjectType::Commit, parent_count);

        // the commit's checkout is its root tree, expanded
        self.max_path_depth
            .adjust(resolver, oid, ObjectType::Commit, root_tree.max_path_depth);
        self.max_path_length
            .adjust(resolver, oid, ObjectType::Commit, root_tree.max_path_length);
        self.max_expanded_tree_count.adjust(
            resolver,
            oid,
            ObjectType::Commit,
            root_tree.expanded_tree_count,
        );
        self.max_expanded_blob_count.adjust(
            resolver,
            oid,
            ObjectType::Commit,
            root_tree.expanded_blob_count,
        );
        self.max_expanded_blob_size.adjust(
            resolver,
            oid,
            ObjectType::Commit,
            root_tree.expanded_blob_size,
        );
        self.max_expanded_link_count.adjust(
            resolver,
            oid,
            ObjectType::Commit,
            root_tree.expanded_link_count,
        );
        self.max_expanded_submodule_count.adjust(
            resolver,
            oid,
            ObjectType::Commit,
            root_tree.expanded_submodule_count,
        );
    }

    pub(crate) fn record_tag(
        &mut self,
        resolver: &mut PathResolver,
        oid: ObjectHash,
        size: &TagSize,
        object_size: Count32,
    ) {
        self.unique_tag_count.increment(Count32::new(1));
        self.unique_tag_size.increment(Count64::from(object_size));
        self.max_tag_depth
            .adjust(resolver, oid, ObjectType::Tag, size.tag_depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A tree with zero entries finalizes to one tree of depth one and
    /// nothing else.
    #[test]
    fn test_empty_tree_finalizes() {
        let mut size = TreeSize::default();
        size.finish();
        assert_eq!(size.max_path_depth.value(), 1);
        assert_eq!(size.max_path_length.value(), 0);
        assert_eq!(size.expanded_tree_count.value(), 1);
        assert_eq!(size.expanded_blob_count.value(), 0);
        assert_eq!(size.expanded_blob_size.value(), 0);
        assert_eq!(size.expanded_link_count.value(), 0);
        assert_eq!(size.expanded_submodule_count.value(), 0);
    }

    /// Depth and length roll up through nested trees: a child of depth d
    /// contributes d+1, and path length accounts for the slash.
    #[test]
    fn test_nested_aggregation() {
        let mut leaf = TreeSize::default();
        leaf.add_blob(6, BlobSize::new(100)); // "sixsix"
        leaf.finish();
        assert_eq!(leaf.max_path_depth.value(), 1);
        assert_eq!(leaf.max_path_length.value(), 6);

        let mut parent = TreeSize::default();
        parent.add_descendent(3, &leaf); // "dir"
        parent.add_blob(1, BlobSize::new(7)); // "f"
        parent.finish();
        assert_eq!(parent.max_path_depth.value(), 2);
        assert_eq!(parent.max_path_length.value(), 3 + 1 + 6);
        assert_eq!(parent.expanded_tree_count.value(), 2);
        assert_eq!(parent.expanded_blob_count.value(), 2);
        assert_eq!(parent.expanded_blob_size.value(), 107);
    }

    /// Links and submodules count themselves and their name lengths only.
    #[test]
    fn test_link_and_submodule_entries() {
        let mut size = TreeSize::default();
        size.add_link(12);
        size.add_submodule(4);
        size.finish();
        assert_eq!(size.expanded_link_count.value(), 1);
        assert_eq!(size.expanded_submodule_count.value(), 1);
        assert_eq!(size.max_path_length.value(), 12);
        assert_eq!(size.max_path_depth.value(), 1);
        assert_eq!(size.expanded_blob_count.value(), 0);
    }

    /// A new maximum swaps the tracked path; a tie leaves it alone.
    #[test]
    fn test_maximum_path_tracking() {
        use bstr::ByteSlice;

        let mut resolver = PathResolver::new();
        let mut max = Maximum32::default();
        let first = ObjectHash([1; 20]);
        let second = ObjectHash([2; 20]);
        max.adjust(&mut resolver, first, ObjectType::Blob, Count32::new(10));
        max.adjust(&mut resolver, second, ObjectType::Blob, Count32::new(10));
        resolver.record_reference(b"refs/heads/one".as_bstr(), first);
        assert_eq!(max.value.value(), 10);
        assert_eq!(max.path_string().as_deref(), Some("refs/heads/one"));

        max.adjust(&mut resolver, second, ObjectType::Blob, Count32::new(11));
        resolver.record_reference(b"refs/heads/two".as_bstr(), second);
        assert_eq!(max.path_string().as_deref(), Some("refs/heads/two"));
        assert_eq!(resolver.seeking_len(), 0);
    }
}
