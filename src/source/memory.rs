//! In-memory object source.
//!
//! Holds a complete object store in maps and replays it through the
//! [`ObjectSource`] iterators with the same ordering contract as the git
//! plumbing source: commits stream children before parents, tags surface
//! before what they point at, and each commit's new trees follow it in
//! depth-first order. Objects are hashed exactly as git hashes them, so
//! synthesized repositories carry realistic ids and byte sizes.
//!
//! The builder methods make this the substrate for scan tests, and a way for
//! consumers to exercise their own tooling against crafted histories
//! (git bombs, tag chains, submodules) without touching disk.

use std::collections::{HashMap, HashSet};

use bstr::{BString, ByteSlice};

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::object::{commit, tag, tree, types::ObjectType},
    source::{BatchHeader, ContentsIter, HeaderIter, ObjectSource, RefIter, Reference},
};

/// Fixed identities keep synthesized object bytes, and therefore ids and
/// sizes, deterministic.
pub const AUTHOR: &str = "A U Thor <author@example.com> 1112911993 -0700";
pub const COMMITTER: &str = "C O Mitter <committer@example.com> 1112911993 -0700";
pub const TAGGER: &str = "T Agger <tagger@example.com> 1112911993 -0700";

struct StoredObject {
    object_type: ObjectType,
    data: Vec<u8>,
}

/// An object store plus references, entirely in memory.
#[derive(Default)]
pub struct MemorySource {
    objects: HashMap<ObjectHash, StoredObject>,
    refs: Vec<(BString, ObjectHash)>,
}

impl MemorySource {
    pub fn new() -> MemorySource {
        MemorySource::default()
    }

    fn insert(&mut self, object_type: ObjectType, data: Vec<u8>) -> ObjectHash {
        let oid = ObjectHash::from_type_and_data(object_type, &data);
        self.objects.insert(oid, StoredObject { object_type, data });
        oid
    }

    /// Store a blob and return its id.
    pub fn add_blob(&mut self, data: &[u8]) -> ObjectHash {
        self.insert(ObjectType::Blob, data.to_vec())
    }

    /// Store a tree from `(mode, name, child)` entries, in the given order.
    pub fn add_tree(&mut self, entries: &[(u32, &str, ObjectHash)]) -> ObjectHash {
        let data = tree::encode(
            entries
                .iter()
                .map(|(mode, name, oid)| (*mode, name.as_bytes(), *oid)),
        );
        self.insert(ObjectType::Tree, data)
    }

    /// Store a commit with fixed author and committer identities.
    pub fn add_commit(
        &mut self,
        tree_id: ObjectHash,
        parent_ids: &[ObjectHash],
        message: &str,
    ) -> ObjectHash {
        let data = commit::encode(tree_id, parent_ids, AUTHOR, COMMITTER, message);
        self.insert(ObjectType::Commit, data)
    }

    /// Store an annotated tag. The referent type is taken as given, so
    /// dangling tags can be synthesized deliberately.
    pub fn add_tag(
        &mut self,
        object_id: ObjectHash,
        object_type: ObjectType,
        tag_name: &str,
        message: &str,
    ) -> ObjectHash {
        let data = tag::encode(object_id, object_type, tag_name, TAGGER, message);
        self.insert(ObjectType::Tag, data)
    }

    /// Add a reference pointing at a stored object.
    pub fn add_reference(&mut self, name: &str, oid: ObjectHash) {
        self.refs.push((BString::from(name), oid));
    }

    fn header(&self, oid: ObjectHash) -> BatchHeader {
        match self.objects.get(&oid) {
            Some(obj) => BatchHeader {
                oid,
                object_type: obj.object_type,
                size: obj.data.len() as u64,
            },
            None => BatchHeader {
                oid,
                object_type: ObjectType::Missing,
                size: 0,
            },
        }
    }

    /// Commits reachable from `root` through parent edges, ancestors first.
    fn commit_postorder(
        &self,
        root: ObjectHash,
        visited: &mut HashSet<ObjectHash>,
        out: &mut Vec<ObjectHash>,
    ) -> Result<(), GitError> {
        let mut stack = vec![(root, false)];
        while let Some((oid, expanded)) = stack.pop() {
            if expanded {
                out.push(oid);
                continue;
            }
            if !visited.insert(oid) {
                continue;
            }
            stack.push((oid, true));
            if let Some(obj) = self.objects.get(&oid) {
                let parsed = commit::Commit::from_bytes(&obj.data)?;
                for parent in parsed.parent_ids {
                    if !visited.contains(&parent) {
                        stack.push((parent, false));
                    }
                }
            }
        }
        Ok(())
    }

    /// Depth-first emission of a tree and every object under it that has not
    /// surfaced yet. Submodule entries point outside this repository and are
    /// not followed.
    fn walk_tree(
        &self,
        root: ObjectHash,
        seen: &mut HashSet<ObjectHash>,
        out: &mut Vec<BatchHeader>,
    ) -> Result<(), GitError> {
        let mut stack = vec![root];
        while let Some(oid) = stack.pop() {
            if !seen.insert(oid) {
                continue;
            }
            out.push(self.header(oid));
            let Some(obj) = self.objects.get(&oid) else {
                continue;
            };
            if obj.object_type != ObjectType::Tree {
                continue;
            }
            let mut children = Vec::new();
            for entry in tree::entries(&obj.data) {
                let entry = entry?;
                if entry.mode.kind() != tree::EntryKind::Submodule {
                    children.push(entry.oid);
                }
            }
            for child in children.into_iter().rev() {
                if !seen.contains(&child) {
                    stack.push(child);
                }
            }
        }
        Ok(())
    }
}

impl ObjectSource for MemorySource {
    fn references(&self) -> Result<RefIter<'_>, GitError> {
        let mut refs = self.refs.clone();
        refs.sort_by(|a, b| a.0.cmp(&b.0));
        let out: Vec<Result<Reference, GitError>> = refs
            .into_iter()
            .map(|(name, oid)| {
                let header = self.header(oid);
                Ok(Reference {
                    name,
                    oid,
                    object_type: header.object_type,
                    size: header.size,
                })
            })
            .collect();
        Ok(Box::new(out.into_iter()))
    }

    fn reachable_object_headers(&self, roots: &[ObjectHash]) -> Result<HeaderIter<'_>, GitError> {
        let mut seen: HashSet<ObjectHash> = HashSet::new();
        let mut out: Vec<BatchHeader> = Vec::new();
        let mut commit_roots: Vec<ObjectHash> = Vec::new();

        for &root in roots {
            // peel tag chains, surfacing each tag object on the way
            let mut cur = root;
            loop {
                match self.objects.get(&cur) {
                    None => {
                        if seen.insert(cur) {
                            out.push(self.header(cur));
                        }
                        break;
                    }
                    Some(obj) => match obj.object_type {
                        ObjectType::Tag => {
                            if !seen.insert(cur) {
                                break;
                            }
                            out.push(self.header(cur));
                            cur = tag::Tag::from_bytes(&obj.data)?.object_id;
                        }
                        ObjectType::Commit => {
                            commit_roots.push(cur);
                            break;
                        }
                        ObjectType::Tree => {
                            self.walk_tree(cur, &mut seen, &mut out)?;
                            break;
                        }
                        ObjectType::Blob | ObjectType::Missing => {
                            if seen.insert(cur) {
                                out.push(self.header(cur));
                            }
                            break;
                        }
                    },
                }
            }
        }

        let mut visited: HashSet<ObjectHash> = HashSet::new();
        let mut ordered_commits: Vec<ObjectHash> = Vec::new();
        for &root in &commit_roots {
            self.commit_postorder(root, &mut visited, &mut ordered_commits)?;
        }
        ordered_commits.reverse(); // children before parents, like rev-list

        let mut commit_trees: Vec<ObjectHash> = Vec::new();
        for &oid in &ordered_commits {
            if seen.insert(oid) {
                out.push(self.header(oid));
            }
            if let Some(obj) = self.objects.get(&oid) {
                commit_trees.push(commit::Commit::from_bytes(&obj.data)?.tree_id);
            }
        }
        for tree_id in commit_trees {
            self.walk_tree(tree_id, &mut seen, &mut out)?;
        }

        Ok(Box::new(out.into_iter().map(Ok)))
    }

    fn object_contents(&self, oids: Vec<ObjectHash>) -> Result<ContentsIter<'_>, GitError> {
        let out: Vec<Result<(BatchHeader, Vec<u8>), GitError>> = oids
            .into_iter()
            .map(|oid| match self.objects.get(&oid) {
                Some(obj) => Ok((self.header(oid), obj.data.clone())),
                None => Err(GitError::MissingObject(oid.to_string())),
            })
            .collect();
        Ok(Box::new(out.into_iter()))
    }

    fn resolve_object(&self, spec: &str) -> Result<ObjectHash, GitError> {
        if let Ok(oid) = spec.parse::<ObjectHash>() {
            if self.objects.contains_key(&oid) {
                return Ok(oid);
            }
        }
        self.refs
            .iter()
            .find(|(name, _)| name.as_bytes() == spec.as_bytes())
            .map(|(_, oid)| *oid)
            .ok_or_else(|| GitError::UnresolvedObject(spec.to_string()))
    }
}
