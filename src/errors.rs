//! Error types for the Git-Shape crate.
//!
//! This module defines a unified error enumeration used across repository
//! opening, reference classification, the subprocess object source, object
//! parsing and the size graph. It integrates with `thiserror` to provide rich
//! `Display` implementations and error source chaining where applicable.
//!
//! Notes:
//! - Each variant carries contextual details via its message payload.
//! - Walk errors name the offending object id and the scan phase where known.
//! - Counter overflow is never an error; it surfaces as a flag on readout.

use thiserror::Error;

#[derive(Error, Debug)]
/// Unified error enumeration for the Git-Shape library.
///
/// - Used across repository open, classification, object streaming and sizing.
/// - Implements `std::error::Error` via `thiserror`.
pub enum GitError {
    /// Invalid or unsupported git object type name.
    #[error("The `{0}` is not a valid git object type.")]
    InvalidObjectType(String),

    /// Invalid tree entry (mode/name/hash).
    #[error("The `{0}` is not a valid git tree item.")]
    InvalidTreeItem(String),

    /// Malformed commit object.
    #[error("Not a valid git commit object: {0}")]
    InvalidCommitObject(String),

    /// Malformed tag object.
    #[error("Not a valid git tag object: {0}")]
    InvalidTagObject(String),

    /// Invalid SHA1 hash formatting or value.
    #[error("The {0} is not a valid Hash value ")]
    InvalidHashValue(String),

    /// An object reported by the underlying repository as absent.
    #[error("Object {0} is missing from the repository")]
    MissingObject(String),

    /// A revision or reference that does not resolve to an object.
    #[error("Cannot resolve `{0}` to an object")]
    UnresolvedObject(String),

    /// Path does not point at a git repository.
    #[error("`{0}` is not a git repository")]
    RepositoryNotFound(String),

    /// Shallow clones cannot be measured faithfully and are rejected.
    #[error("Repository `{0}` is shallow; full history is required")]
    ShallowRepository(String),

    /// The git binary could not be found or failed to start.
    #[error("Failed to start git subprocess: {0}")]
    GitSpawn(String),

    /// Malformed output or premature EOF on a git plumbing stream.
    #[error("Object source protocol error: {0}")]
    SourceProtocol(String),

    /// Invalid regular expression in a reference filter or group rule.
    #[error("Invalid regexp `{0}`: {1}")]
    InvalidRegexp(String, String),

    /// A reference group symbol that is neither built in nor configured.
    #[error("Unknown reference group `{0}`")]
    UnknownRefGroup(String),

    /// Invalid reference group configuration entry.
    #[error("Invalid refgroup configuration: {0}")]
    InvalidRefGroupConfig(String),

    /// I/O error from underlying reader or writer.
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),

    /// The scan was cancelled by the host.
    #[error("Scan cancelled")]
    Cancelled,
}
