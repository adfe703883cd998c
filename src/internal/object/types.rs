//! Object type enumeration.
//!
//! In Git, each object type is identified by a short ASCII token in plumbing
//! output and inside tag headers. The walk deals with the four storable
//! kinds; `Missing` is the marker the batched header stream emits for an id
//! the repository cannot produce, which is always fatal to a scan.

use std::fmt::Display;

use serde::Serialize;

use crate::errors::GitError;

#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Commit,
    Tree,
    Blob,
    Tag,
    Missing,
}

const COMMIT_OBJECT_TYPE: &[u8] = b"commit";
const TREE_OBJECT_TYPE: &[u8] = b"tree";
const BLOB_OBJECT_TYPE: &[u8] = b"blob";
const TAG_OBJECT_TYPE: &[u8] = b"tag";
const MISSING_OBJECT_TYPE: &[u8] = b"missing";

/// Display trait for Git objects type
impl Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ObjectType::Commit => write!(f, "commit"),
            ObjectType::Tree => write!(f, "tree"),
            ObjectType::Blob => write!(f, "blob"),
            ObjectType::Tag => write!(f, "tag"),
            ObjectType::Missing => write!(f, "missing"),
        }
    }
}

impl ObjectType {
    /// ASCII token for this type as written by git plumbing.
    pub fn to_bytes(&self) -> &'static [u8] {
        match self {
            ObjectType::Commit => COMMIT_OBJECT_TYPE,
            ObjectType::Tree => TREE_OBJECT_TYPE,
            ObjectType::Blob => BLOB_OBJECT_TYPE,
            ObjectType::Tag => TAG_OBJECT_TYPE,
            ObjectType::Missing => MISSING_OBJECT_TYPE,
        }
    }

    /// Parse a plumbing type token.
    pub fn from_bytes(s: &[u8]) -> Result<ObjectType, GitError> {
        match s {
            COMMIT_OBJECT_TYPE => Ok(ObjectType::Commit),
            TREE_OBJECT_TYPE => Ok(ObjectType::Tree),
            BLOB_OBJECT_TYPE => Ok(ObjectType::Blob),
            TAG_OBJECT_TYPE => Ok(ObjectType::Tag),
            MISSING_OBJECT_TYPE => Ok(ObjectType::Missing),
            _ => Err(GitError::InvalidObjectType(
                String::from_utf8_lossy(s).into_owned(),
            )),
        }
    }

    /// Parses a string representation of a Git object type.
    pub fn from_string(s: &str) -> Result<ObjectType, GitError> {
        ObjectType::from_bytes(s.as_bytes())
    }
}
