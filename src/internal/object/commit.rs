//! Commit object parsing.
//!
//! The size graph needs only the graph-shaping parts of a commit: the root
//! tree it snapshots and the parents it descends from. Author, committer and
//! message are ignored; they contribute to the commit's byte size, which
//! arrives separately with the object header.

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::object::header_lines,
};

/// The graph-relevant content of one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree_id: ObjectHash,
    pub parent_ids: Vec<ObjectHash>,
}

impl Commit {
    /// Parse a raw commit body. Exactly one `tree` header is required;
    /// `parent` headers may repeat; everything else is skipped.
    pub fn from_bytes(data: &[u8]) -> Result<Commit, GitError> {
        let mut tree_id: Option<ObjectHash> = None;
        let mut parent_ids = Vec::new();
        for header in header_lines(data) {
            let (key, value) =
                header.map_err(|e| GitError::InvalidCommitObject(e.to_string()))?;
            match key {
                b"tree" => {
                    if tree_id.is_some() {
                        return Err(GitError::InvalidCommitObject(
                            "duplicate tree header".to_string(),
                        ));
                    }
                    tree_id = Some(ObjectHash::from_hex_bytes(value).map_err(|e| {
                        GitError::InvalidCommitObject(format!("bad tree id: {e}"))
                    })?);
                }
                b"parent" => {
                    parent_ids.push(ObjectHash::from_hex_bytes(value).map_err(|e| {
                        GitError::InvalidCommitObject(format!("bad parent id: {e}"))
                    })?);
                }
                _ => {}
            }
        }
        let tree_id = tree_id
            .ok_or_else(|| GitError::InvalidCommitObject("missing tree header".to_string()))?;
        Ok(Commit {
            tree_id,
            parent_ids,
        })
    }
}

/// Serialize a canonical commit body from its parts. The author and
/// committer fields are passed as full identity lines
/// (`name <email> timestamp zone`).
pub fn encode(
    tree_id: ObjectHash,
    parent_ids: &[ObjectHash],
    author: &str,
    committer: &str,
    message: &str,
) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend(b"tree ");
    data.extend(tree_id.to_string().as_bytes());
    data.push(b'\n');
    for parent in parent_ids {
        data.extend(b"parent ");
        data.extend(parent.to_string().as_bytes());
        data.push(b'\n');
    }
    data.extend(b"author ");
    data.extend(author.as_bytes());
    data.push(b'\n');
    data.extend(b"committer ");
    data.extend(committer.as_bytes());
    data.push(b'\n');
    data.push(b'\n');
    data.extend(message.as_bytes());
    data
}
