//! Object sources.
//!
//! The scan core consumes Git data exclusively through the pull-iterators of
//! the [`ObjectSource`] trait: every reference, every reachable object header
//! in topological order, and full bodies for a requested id set. Any failure
//! of an underlying stream is fatal to the walk; nothing is retried.
//!
//! [`git::GitRepository`] implements the trait over git plumbing
//! subprocesses; [`memory::MemorySource`] implements it over an in-memory
//! object store, which is also how the scan logic is exercised in tests.

pub mod git;
pub mod memory;

use bstr::BString;

use crate::{errors::GitError, hash::ObjectHash, internal::object::types::ObjectType};

/// One reference: a named entry point into the object graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: BString,
    pub oid: ObjectHash,
    pub object_type: ObjectType,
    pub size: u64,
}

/// One object header from the reachability stream: identity, kind and byte
/// size, but no contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchHeader {
    pub oid: ObjectHash,
    pub object_type: ObjectType,
    pub size: u64,
}

pub type RefIter<'a> = Box<dyn Iterator<Item = Result<Reference, GitError>> + 'a>;
pub type HeaderIter<'a> = Box<dyn Iterator<Item = Result<BatchHeader, GitError>> + 'a>;
pub type ContentsIter<'a> = Box<dyn Iterator<Item = Result<(BatchHeader, Vec<u8>), GitError>> + 'a>;

/// A pull-style, lazy source of Git objects.
pub trait ObjectSource {
    /// Stream every reference in the repository.
    fn references(&self) -> Result<RefIter<'_>, GitError>;

    /// Stream the header of every object reachable from `roots`, each unique
    /// id exactly once, referents before referrers where the underlying
    /// walk order allows.
    fn reachable_object_headers(&self, roots: &[ObjectHash]) -> Result<HeaderIter<'_>, GitError>;

    /// Stream full bodies for the requested ids, in request order. Callers
    /// only request trees, commits and tags; blobs are sized from their
    /// headers.
    fn object_contents(&self, oids: Vec<ObjectHash>) -> Result<ContentsIter<'_>, GitError>;

    /// Resolve a revision expression to an object id.
    fn resolve_object(&self, spec: &str) -> Result<ObjectHash, GitError>;
}
