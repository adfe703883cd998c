//! The scan driver.
//!
//! One [`Analyzer`] value owns everything a scan needs: the object source,
//! the reference grouper, and an optional cancellation flag. The scan runs
//! in three phases over a single pass of the repository:
//!
//! 1. references stream through the grouper; walked tips become roots,
//! 2. headers of every reachable object stream in topological order; blobs
//!    finalize on the spot, everything else queues by type,
//! 3. tree, commit and tag bodies stream back in one batched request (trees
//!    and commits in reverse header order, so referents mostly precede
//!    referrers) and register with the size graph.
//!
//! Any stream failure or parse error aborts the scan; no partial aggregate
//! is ever returned.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use bstr::{BString, ByteSlice};

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::{
        graph::SizeGraph,
        object::types::ObjectType,
        refs::{RefGroupTally, RefGrouper},
        sizes::HistorySize,
    },
    source::ObjectSource,
};

/// Everything a scan produces: the repository-wide aggregate and the ordered
/// per-group reference tallies.
#[derive(Debug)]
pub struct ScanResult {
    pub history: HistorySize,
    pub groups: Vec<RefGroupTally>,
}

/// A single-use scanner over one object source.
pub struct Analyzer<S> {
    source: S,
    grouper: RefGrouper,
    cancel: Option<Arc<AtomicBool>>,
}

impl<S: ObjectSource> Analyzer<S> {
    pub fn new(source: S, grouper: RefGrouper) -> Analyzer<S> {
        Analyzer {
            source,
            grouper,
            cancel: None,
        }
    }

    /// Attach a host-owned cancellation flag. The scan checks it between
    /// object registrations and fails with [`GitError::Cancelled`] once it
    /// is raised.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Analyzer<S> {
        self.cancel = Some(flag);
        self
    }

    /// Run the scan to completion.
    pub fn scan(self) -> Result<ScanResult, GitError> {
        let Analyzer {
            source,
            mut grouper,
            cancel,
        } = self;
        let mut graph = SizeGraph::new();

        // reference phase
        let mut roots: Vec<ObjectHash> = Vec::new();
        let mut walked: Vec<(BString, ObjectHash)> = Vec::new();
        let mut seen_refs = 0usize;
        for reference in source.references()? {
            check_cancelled(&cancel)?;
            let reference = reference?;
            seen_refs += 1;
            let (walk, _symbols) = grouper.record(reference.name.as_bstr());
            if walk {
                graph.register_reference(reference.name.as_bstr(), reference.oid);
                roots.push(reference.oid);
                walked.push((reference.name, reference.oid));
            }
        }
        tracing::debug!("walking {} of {seen_refs} references", roots.len());
        if roots.is_empty() {
            return Ok(ScanResult {
                history: graph.into_history(),
                groups: grouper.tallies(),
            });
        }

        // header phase
        let mut trees: Vec<ObjectHash> = Vec::new();
        let mut commits: Vec<ObjectHash> = Vec::new();
        let mut tags: Vec<ObjectHash> = Vec::new();
        let mut blobs = 0usize;
        for header in source.reachable_object_headers(&roots)? {
            check_cancelled(&cancel)?;
            let header = header?;
            match header.object_type {
                ObjectType::Blob => {
                    blobs += 1;
                    graph.register_blob(header.oid, header.size);
                }
                ObjectType::Tree => trees.push(header.oid),
                ObjectType::Commit => commits.push(header.oid),
                ObjectType::Tag => tags.push(header.oid),
                ObjectType::Missing => {
                    return Err(GitError::MissingObject(format!(
                        "{} (header phase)",
                        header.oid
                    )));
                }
            }
        }
        tracing::debug!(
            "headers streamed: {} commits, {} trees, {blobs} blobs, {} tags",
            commits.len(),
            trees.len(),
            tags.len(),
        );

        // content phase: one batched request. Reversing trees and commits
        // turns the header stream's referrers-first order into
        // referents-first, so almost everything finalizes on registration.
        let mut request: Vec<ObjectHash> =
            Vec::with_capacity(trees.len() + commits.len() + tags.len());
        request.extend(trees.iter().rev().copied());
        request.extend(commits.iter().rev().copied());
        request.extend(tags.iter().copied());
        for item in source.object_contents(request)? {
            check_cancelled(&cancel)?;
            let (header, body) = item?;
            match header.object_type {
                ObjectType::Tree => graph.register_tree(header.oid, header.size, &body)?,
                ObjectType::Commit => graph.register_commit(header.oid, header.size, &body)?,
                ObjectType::Tag => graph.register_tag(header.oid, header.size, &body)?,
                other => {
                    return Err(GitError::SourceProtocol(format!(
                        "unexpected {other} object {} in content stream",
                        header.oid
                    )));
                }
            }
        }
        if let Some(oid) = graph.first_pending_tree() {
            return Err(GitError::MissingObject(format!(
                "tree {oid} never finalized (content phase)"
            )));
        }
        if let Some(oid) = graph.first_pending_tag() {
            return Err(GitError::MissingObject(format!(
                "tag {oid} never finalized (content phase)"
            )));
        }

        // late naming pass so extremum paths can resolve to refnames
        for (name, oid) in &walked {
            graph.name_reference(name.as_bstr(), *oid);
        }

        Ok(ScanResult {
            history: graph.into_history(),
            groups: grouper.tallies(),
        })
    }
}

fn check_cancelled(cancel: &Option<Arc<AtomicBool>>) -> Result<(), GitError> {
    if let Some(flag) = cancel {
        if flag.load(Ordering::Relaxed) {
            return Err(GitError::Cancelled);
        }
    }
    Ok(())
}
