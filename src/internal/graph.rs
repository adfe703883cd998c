//! The streaming object-graph size accumulator.
//!
//! Objects register here in the order the object source streams them. Blobs
//! finalize from their header alone. A tree may reference subtrees that have
//! not finalized yet; its partial record then parks with a pending-child
//! count, and each missing child carries a listener that folds the child's
//! finished size back in and decrements the count. When the count reaches
//! zero the tree finalizes, which may cascade through an explicit work queue
//! (never recursion) into parents that were waiting on it. Tag chains use the
//! same scheme with a pending count of at most one. Commits arrive parents
//! first, so they finalize synchronously.
//!
//! Every finalization updates the global [`HistorySize`] aggregate and, where
//! a maximum changes, re-targets the path resolver at the new winner.

use std::collections::{HashMap, VecDeque, hash_map::Entry};

use bstr::BStr;

use crate::{
    counter::Count32,
    errors::GitError,
    hash::ObjectHash,
    internal::{
        object::{
            commit::Commit,
            tag::Tag,
            tree::{self, EntryKind},
            types::ObjectType,
        },
        path::PathResolver,
        sizes::{BlobSize, CommitSize, HistorySize, TagSize, TreeSize},
    },
};

/// A parent tree waiting for one child: when the child finalizes, fold its
/// size in under an entry name of this length.
struct TreeListener {
    parent: ObjectHash,
    name_len: usize,
}

struct PendingTree {
    /// False while this is a placeholder for an id that has been referenced
    /// but whose entries have not been scanned yet.
    started: bool,
    size: TreeSize,
    object_size: Count32,
    entry_count: Count32,
    pending_children: u32,
    listeners: Vec<TreeListener>,
}

impl PendingTree {
    fn placeholder(listener: TreeListener) -> PendingTree {
        PendingTree {
            started: false,
            size: TreeSize::default(),
            object_size: Count32::default(),
            entry_count: Count32::default(),
            pending_children: 0,
            listeners: vec![listener],
        }
    }
}

enum TreeRecord {
    Pending(PendingTree),
    Finalized(TreeSize),
}

struct PendingTag {
    started: bool,
    object_size: Count32,
    /// Outer tags waiting on this tag's depth. The pending count of a tag is
    /// implicitly 0 or 1: it waits on nothing but its own referent.
    listeners: Vec<ObjectHash>,
}

enum TagRecord {
    Pending(PendingTag),
    Finalized(TagSize),
}

/// Accumulates sizes for every object of the walk and owns all pending
/// records, the finalized size maps, the path resolver and the global
/// aggregate.
#[derive(Default)]
pub struct SizeGraph {
    blob_sizes: HashMap<ObjectHash, BlobSize>,
    tree_records: HashMap<ObjectHash, TreeRecord>,
    commit_sizes: HashMap<ObjectHash, CommitSize>,
    tag_records: HashMap<ObjectHash, TagRecord>,
    resolver: PathResolver,
    history: HistorySize,
}

impl SizeGraph {
    pub fn new() -> SizeGraph {
        SizeGraph::default()
    }

    /// A walked reference: counts toward the aggregate and may name a sought
    /// path.
    pub fn register_reference(&mut self, refname: &BStr, oid: ObjectHash) {
        self.history.record_reference();
        self.resolver.record_reference(refname, oid);
    }

    /// Blobs are sized by their header alone.
    pub fn register_blob(&mut self, oid: ObjectHash, object_size: u64) {
        let size = BlobSize::new(object_size);
        self.blob_sizes.insert(oid, size);
        self.history.record_blob(&mut self.resolver, oid, size);
    }

    /// Scan a tree body. Finalizes immediately when every subtree is already
    /// sized; parks with listeners otherwise.
    pub fn register_tree(
        &mut self,
        oid: ObjectHash,
        object_size: u64,
        data: &[u8],
    ) -> Result<(), GitError> {
        let mut size = TreeSize::default();
        let mut entry_count: u64 = 0;
        let mut pending_children = 0u32;
        for entry in tree::entries(data) {
            let entry = entry.map_err(|e| in_object(e, "tree", oid))?;
            entry_count += 1;
            self.resolver.record_tree_entry(oid, entry.name, entry.oid);
            match entry.mode.kind() {
                EntryKind::Tree => match self.tree_records.entry(entry.oid) {
                    Entry::Occupied(mut occupied) => match occupied.get_mut() {
                        TreeRecord::Finalized(child) => {
                            size.add_descendent(entry.name.len(), child)
                        }
                        TreeRecord::Pending(child) => {
                            child.listeners.push(TreeListener {
                                parent: oid,
                                name_len: entry.name.len(),
                            });
                            pending_children += 1;
                        }
                    },
                    Entry::Vacant(vacant) => {
                        vacant.insert(TreeRecord::Pending(PendingTree::placeholder(
                            TreeListener {
                                parent: oid,
                                name_len: entry.name.len(),
                            },
                        )));
                        pending_children += 1;
                    }
                },
                EntryKind::Submodule => size.add_submodule(entry.name.len()),
                EntryKind::Symlink => size.add_link(entry.name.len()),
                EntryKind::Blob => {
                    let blob = self.blob_sizes.get(&entry.oid).copied().ok_or_else(|| {
                        GitError::MissingObject(format!(
                            "blob {} referenced by tree {oid}",
                            entry.oid
                        ))
                    })?;
                    size.add_blob(entry.name.len(), blob);
                }
            }
        }

        let listeners = match self.tree_records.remove(&oid) {
            None => Vec::new(),
            Some(TreeRecord::Pending(placeholder)) if !placeholder.started => {
                placeholder.listeners
            }
            Some(_) => {
                return Err(GitError::SourceProtocol(format!(
                    "tree {oid} streamed more than once"
                )));
            }
        };
        let object_size = Count32::new(object_size);
        let entry_count = Count32::new(entry_count);
        if pending_children == 0 {
            self.finalize_trees(oid, size, object_size, entry_count, listeners);
        } else {
            self.tree_records.insert(
                oid,
                TreeRecord::Pending(PendingTree {
                    started: true,
                    size,
                    object_size,
                    entry_count,
                    pending_children,
                    listeners,
                }),
            );
        }
        Ok(())
    }

    /// Finalize one tree and cascade through every parent this unblocks.
    fn finalize_trees(
        &mut self,
        oid: ObjectHash,
        size: TreeSize,
        object_size: Count32,
        entry_count: Count32,
        listeners: Vec<TreeListener>,
    ) {
        let mut queue = VecDeque::new();
        queue.push_back((oid, size, object_size, entry_count, listeners));
        while let Some((oid, mut size, object_size, entry_count, listeners)) = queue.pop_front() {
            size.finish();
            self.history
                .record_tree(&mut self.resolver, oid, &size, object_size, entry_count);
            for listener in listeners {
                let unblocked = match self.tree_records.get_mut(&listener.parent) {
                    Some(TreeRecord::Pending(parent)) => {
                        parent.size.add_descendent(listener.name_len, &size);
                        parent.pending_children -= 1;
                        parent.pending_children == 0
                    }
                    _ => false,
                };
                if unblocked {
                    if let Some(TreeRecord::Pending(parent)) =
                        self.tree_records.remove(&listener.parent)
                    {
                        queue.push_back((
                            listener.parent,
                            parent.size,
                            parent.object_size,
                            parent.entry_count,
                            parent.listeners,
                        ));
                    }
                }
            }
            self.tree_records.insert(oid, TreeRecord::Finalized(size));
        }
    }

    /// Register a commit. Its root tree and all parents must already be
    /// finalized (the scan orders contents so that they are), so commits
    /// never park.
    pub fn register_commit(
        &mut self,
        oid: ObjectHash,
        object_size: u64,
        data: &[u8],
    ) -> Result<(), GitError> {
        let commit = Commit::from_bytes(data).map_err(|e| in_object(e, "commit", oid))?;
        self.resolver.record_commit(oid, commit.tree_id);
        let root_tree = match self.tree_records.get(&commit.tree_id) {
            Some(TreeRecord::Finalized(tree)) => tree.clone(),
            _ => {
                return Err(GitError::MissingObject(format!(
                    "tree {} referenced by commit {oid}",
                    commit.tree_id
                )));
            }
        };
        let mut size = CommitSize::default();
        for parent in &commit.parent_ids {
            let parent_size = self.commit_sizes.get(parent).ok_or_else(|| {
                GitError::MissingObject(format!("commit {parent} referenced by commit {oid}"))
            })?;
            size.max_ancestor_depth
                .adjust_max(parent_size.max_ancestor_depth);
        }
        size.max_ancestor_depth.increment(Count32::new(1));
        self.commit_sizes.insert(oid, size);
        self.history.record_commit(
            &mut self.resolver,
            oid,
            &size,
            Count32::new(object_size),
            Count32::new(commit.parent_ids.len() as u64),
            &root_tree,
        );
        Ok(())
    }

    /// Register an annotated tag. A tag pointing at another tag parks until
    /// the referent's chain depth is known; any other referent gives depth 1
    /// immediately.
    pub fn register_tag(
        &mut self,
        oid: ObjectHash,
        object_size: u64,
        data: &[u8],
    ) -> Result<(), GitError> {
        let tag = Tag::from_bytes(data).map_err(|e| in_object(e, "tag", oid))?;
        self.resolver.record_tag(oid, tag.object_id);
        let listeners = match self.tag_records.remove(&oid) {
            None => Vec::new(),
            Some(TagRecord::Pending(placeholder)) if !placeholder.started => {
                placeholder.listeners
            }
            Some(_) => {
                return Err(GitError::SourceProtocol(format!(
                    "tag {oid} streamed more than once"
                )));
            }
        };
        let object_size = Count32::new(object_size);
        if tag.object_type != ObjectType::Tag {
            self.finalize_tags(
                oid,
                TagSize {
                    tag_depth: Count32::new(1),
                },
                object_size,
                listeners,
            );
            return Ok(());
        }
        let referent_depth = match self.tag_records.entry(tag.object_id) {
            Entry::Occupied(mut occupied) => match occupied.get_mut() {
                TagRecord::Finalized(referent) => Some(referent.tag_depth),
                TagRecord::Pending(referent) => {
                    referent.listeners.push(oid);
                    None
                }
            },
            Entry::Vacant(vacant) => {
                vacant.insert(TagRecord::Pending(PendingTag {
                    started: false,
                    object_size: Count32::default(),
                    listeners: vec![oid],
                }));
                None
            }
        };
        match referent_depth {
            Some(depth) => self.finalize_tags(
                oid,
                TagSize {
                    tag_depth: depth.plus(Count32::new(1)),
                },
                object_size,
                listeners,
            ),
            None => {
                self.tag_records.insert(
                    oid,
                    TagRecord::Pending(PendingTag {
                        started: true,
                        object_size,
                        listeners,
                    }),
                );
            }
        }
        Ok(())
    }

    /// Finalize one tag and cascade through the chain of outer tags waiting
    /// on it.
    fn finalize_tags(
        &mut self,
        oid: ObjectHash,
        size: TagSize,
        object_size: Count32,
        listeners: Vec<ObjectHash>,
    ) {
        let mut queue = VecDeque::new();
        queue.push_back((oid, size, object_size, listeners));
        while let Some((oid, size, object_size, listeners)) = queue.pop_front() {
            self.history
                .record_tag(&mut self.resolver, oid, &size, object_size);
            for outer in listeners {
                if let Some(TagRecord::Pending(waiting)) = self.tag_records.remove(&outer) {
                    queue.push_back((
                        outer,
                        TagSize {
                            tag_depth: size.tag_depth.plus(Count32::new(1)),
                        },
                        waiting.object_size,
                        waiting.listeners,
                    ));
                }
            }
            self.tag_records.insert(oid, TagRecord::Finalized(size));
        }
    }

    /// Late naming pass: walked refnames resolve whichever extremum paths
    /// ended up rooted at their targets.
    pub fn name_reference(&mut self, refname: &BStr, oid: ObjectHash) {
        self.resolver.record_reference(refname, oid);
    }

    /// Finalized size of one tree, if known.
    pub fn tree_size(&self, oid: &ObjectHash) -> Option<&TreeSize> {
        match self.tree_records.get(oid) {
            Some(TreeRecord::Finalized(size)) => Some(size),
            _ => None,
        }
    }

    /// An id for which a tree record is still pending, if any.
    pub fn first_pending_tree(&self) -> Option<ObjectHash> {
        self.tree_records
            .iter()
            .find(|(_, record)| matches!(record, TreeRecord::Pending(_)))
            .map(|(oid, _)| *oid)
    }

    /// An id for which a tag record is still pending, if any.
    pub fn first_pending_tag(&self) -> Option<ObjectHash> {
        self.tag_records
            .iter()
            .find(|(_, record)| matches!(record, TagRecord::Pending(_)))
            .map(|(oid, _)| *oid)
    }

    pub fn history(&self) -> &HistorySize {
        &self.history
    }

    pub fn into_history(self) -> HistorySize {
        self.history
    }
}

/// Attach the offending object to a parse error.
fn in_object(e: GitError, kind: &str, oid: ObjectHash) -> GitError {
    match e {
        GitError::InvalidTreeItem(msg) => {
            GitError::InvalidTreeItem(format!("{msg} (in {kind} {oid})"))
        }
        GitError::InvalidCommitObject(msg) => {
            GitError::InvalidCommitObject(format!("{msg} (in {kind} {oid})"))
        }
        GitError::InvalidTagObject(msg) => {
            GitError::InvalidTagObject(format!("{msg} (in {kind} {oid})"))
        }
        GitError::InvalidHashValue(msg) => {
            GitError::InvalidHashValue(format!("{msg} (in {kind} {oid})"))
        }
        other => other,
    }
}
