//! Human-readable reachability paths for extremum objects.
//!
//! Which objects end up as maxima is only known once the walk completes, so
//! paths cannot be collected up front without paying O(unique objects). The
//! resolver instead tracks a small set of "currently wanted" ids and builds
//! their names forward while trees, commits, tags and references stream by:
//! when a wanted id shows up as somebody's child, it gets a parent edge and
//! the parent becomes wanted in its place. A seeker refcount keeps live state
//! bounded by the number of tracked maxima.
//!
//! Parent edges only ever point toward a root (a refname or a commit), never
//! back toward children, so the shared `Rc` nodes cannot form a cycle.

use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc};

use bstr::{BStr, BString};
use serde::{Serialize, Serializer};

use crate::{hash::ObjectHash, internal::object::types::ObjectType};

struct PathNode {
    oid: ObjectHash,
    object_type: ObjectType,
    seeker_count: u32,
    parent: Option<PathHandle>,
    relative_path: Option<BString>,
}

/// A shared handle on one node of the path forest.
///
/// A node is in one of three states: seeking (no parent, no name),
/// named-by-ref (name, no parent), or parented (parent and name). Only the
/// last two render to something better than a bare object id.
#[derive(Clone)]
pub struct PathHandle(Rc<RefCell<PathNode>>);

impl PathHandle {
    fn new(oid: ObjectHash, object_type: ObjectType) -> PathHandle {
        PathHandle(Rc::new(RefCell::new(PathNode {
            oid,
            object_type,
            seeker_count: 1,
            parent: None,
            relative_path: None,
        })))
    }

    pub fn oid(&self) -> ObjectHash {
        self.0.borrow().oid
    }
}

impl fmt::Display for PathHandle {
    /// Renders `<refname>` for a root named directly by a reference,
    /// `<root>:<path>` for anything reached through tree entries, and
    /// `<root>^{<type>}` for an object reached only through empty-named
    /// edges (a commit's root tree, a tag's referent). An unresolved root
    /// falls back to its hex object id.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target_is_root = self.0.borrow().parent.is_none();
        let target_type = self.0.borrow().object_type;
        let mut components: Vec<BString> = Vec::new();
        let mut cur = self.0.clone();
        let root_label;
        loop {
            let next = {
                let node = cur.borrow();
                match &node.parent {
                    Some(parent) => {
                        components.push(node.relative_path.clone().unwrap_or_default());
                        parent.0.clone()
                    }
                    None => {
                        root_label = match &node.relative_path {
                            Some(name) => name.to_string(),
                            None => node.oid.to_string(),
                        };
                        break;
                    }
                }
            };
            cur = next;
        }
        components.reverse();
        let components: Vec<String> = components
            .iter()
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect();
        if target_is_root {
            write!(f, "{root_label}")
        } else if components.is_empty() {
            write!(f, "{root_label}^{{{target_type}}}")
        } else {
            write!(f, "{root_label}:{}", components.join("/"))
        }
    }
}

impl fmt::Debug for PathHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathHandle({self})")
    }
}

impl Serialize for PathHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Tracks the objects whose reachability path is currently wanted and
/// resolves them as the walk proceeds.
#[derive(Default)]
pub struct PathResolver {
    seeking: HashMap<ObjectHash, PathHandle>,
}

impl PathResolver {
    pub fn new() -> PathResolver {
        PathResolver::default()
    }

    /// Obtain a seeker for this id's path, creating one if nobody wants it
    /// yet. Idempotent across callers wanting the same id.
    pub fn request_path(&mut self, oid: ObjectHash, object_type: ObjectType) -> PathHandle {
        if let Some(handle) = self.seeking.get(&oid) {
            handle.0.borrow_mut().seeker_count += 1;
            return handle.clone();
        }
        let handle = PathHandle::new(oid, object_type);
        self.seeking.insert(oid, handle.clone());
        handle
    }

    /// Drop one seeker's interest. When the last seeker of a node lets go,
    /// the node stops being tracked and its claim on the parent chain is
    /// released in turn.
    pub fn forget_path(&mut self, handle: PathHandle) {
        let mut cur = Some(handle);
        while let Some(handle) = cur {
            let parent = {
                let mut node = handle.0.borrow_mut();
                debug_assert!(node.seeker_count > 0);
                node.seeker_count -= 1;
                if node.seeker_count > 0 {
                    return;
                }
                let parent = node.parent.take();
                let oid = node.oid;
                drop(node);
                let tracked_here = self
                    .seeking
                    .get(&oid)
                    .is_some_and(|tracked| Rc::ptr_eq(&tracked.0, &handle.0));
                if tracked_here {
                    self.seeking.remove(&oid);
                }
                parent
            };
            cur = parent;
        }
    }

    /// A reference was walked: if its target is sought, the refname is its
    /// path and the search for it ends.
    pub fn record_reference(&mut self, refname: &BStr, oid: ObjectHash) {
        if let Some(handle) = self.seeking.remove(&oid) {
            handle.0.borrow_mut().relative_path = Some(refname.into());
        }
    }

    /// A tree entry streamed by: if the child is sought, parent it under a
    /// (newly wanted) path for the containing tree.
    pub fn record_tree_entry(&mut self, parent_oid: ObjectHash, name: &BStr, child_oid: ObjectHash) {
        if let Some(child) = self.seeking.remove(&child_oid) {
            let parent = self.request_path(parent_oid, ObjectType::Tree);
            let mut node = child.0.borrow_mut();
            node.parent = Some(parent);
            node.relative_path = Some(name.into());
        }
    }

    /// A commit streamed by: if its root tree is sought, attach it under a
    /// path for the commit, with an empty relative name.
    pub fn record_commit(&mut self, oid: ObjectHash, tree_oid: ObjectHash) {
        if let Some(tree) = self.seeking.remove(&tree_oid) {
            let parent = self.request_path(oid, ObjectType::Commit);
            let mut node = tree.0.borrow_mut();
            node.parent = Some(parent);
            node.relative_path = Some(BString::default());
        }
    }

    /// A tag streamed by: if its referent is sought, attach it under a path
    /// for the tag.
    pub fn record_tag(&mut self, oid: ObjectHash, referent_oid: ObjectHash) {
        if let Some(referent) = self.seeking.remove(&referent_oid) {
            let parent = self.request_path(oid, ObjectType::Tag);
            let mut node = referent.0.borrow_mut();
            node.parent = Some(parent);
            node.relative_path = Some(BString::default());
        }
    }

    /// Number of ids currently being sought.
    pub fn seeking_len(&self) -> usize {
        self.seeking.len()
    }
}
