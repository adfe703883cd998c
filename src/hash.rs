//! Hash utilities for Git objects.
//!
//! Every object walked by this crate is named by a 20-byte SHA-1 id. The id is
//! stored as a fixed-width byte array, so equality is byte equality and the
//! type is freely copyable and hashable as a map key.

use std::{fmt::Display, io, str::FromStr};

use serde::{Serialize, Serializer};
use sha1::{Digest, Sha1};

use crate::{errors::GitError, internal::object::types::ObjectType};

/// The 20-byte SHA-1 id naming a Git object.
///
/// Supports conversion to/from hex strings, byte slices, and stream reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHash(pub [u8; 20]);

impl Display for ObjectHash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for ObjectHash {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

/// Parse a 40-character lowercase hex string into an `ObjectHash`.
impl FromStr for ObjectHash {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(GitError::InvalidHashValue(s.to_string()));
        }
        let bytes = hex::decode(s).map_err(|_| GitError::InvalidHashValue(s.to_string()))?;
        let mut h = [0u8; 20];
        h.copy_from_slice(&bytes);
        Ok(ObjectHash(h))
    }
}

/// Reports serialize object ids in their hex form.
impl Serialize for ObjectHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl ObjectHash {
    /// Compute the SHA-1 of raw data.
    pub fn new(data: &[u8]) -> ObjectHash {
        let digest = Sha1::digest(data);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(digest.as_ref());
        ObjectHash(bytes)
    }

    /// Compute the object id git would assign: hash of
    /// `<type> SP <len> NUL <data>`.
    pub fn from_type_and_data(object_type: ObjectType, data: &[u8]) -> ObjectHash {
        let mut d: Vec<u8> = Vec::with_capacity(data.len() + 16);
        d.extend(object_type.to_bytes());
        d.push(b' ');
        d.extend(data.len().to_string().as_bytes());
        d.push(b'\x00');
        d.extend(data);
        ObjectHash::new(&d)
    }

    /// Create an `ObjectHash` from raw bytes; anything but 20 bytes is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<ObjectHash, GitError> {
        if bytes.len() != 20 {
            return Err(GitError::InvalidHashValue(format!(
                "byte length {} (expected 20)",
                bytes.len()
            )));
        }
        let mut h = [0u8; 20];
        h.copy_from_slice(bytes);
        Ok(ObjectHash(h))
    }

    /// Parse a hex object id given as raw bytes (as found in commit and tag
    /// header lines).
    pub fn from_hex_bytes(hex_bytes: &[u8]) -> Result<ObjectHash, GitError> {
        let s = std::str::from_utf8(hex_bytes)
            .map_err(|_| GitError::InvalidHashValue(String::from_utf8_lossy(hex_bytes).into_owned()))?;
        ObjectHash::from_str(s)
    }

    /// Read 20 hash bytes from a stream.
    pub fn from_stream(data: &mut impl io::Read) -> io::Result<ObjectHash> {
        let mut h = [0u8; 20];
        data.read_exact(&mut h)?;
        Ok(ObjectHash(h))
    }

    /// Return raw bytes of the hash.
    pub fn to_data(self) -> Vec<u8> {
        self.0.to_vec()
    }
}
