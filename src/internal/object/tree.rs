//! Tree object parsing.
//!
//! A tree body is a concatenation of `<octal-mode> SP <name> NUL <20-byte id>`
//! records with no padding and no terminator. Entry names are arbitrary bytes
//! (anything except NUL and `/`), so they are handled as byte strings and
//! borrowed straight out of the tree buffer instead of being copied.

use bstr::{BStr, ByteSlice};

use crate::{errors::GitError, hash::ObjectHash};

/// What a tree entry's file mode classifies it as for expansion accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// `040000`: a subtree.
    Tree,
    /// `120000`: a symbolic link.
    Symlink,
    /// `160000`: a gitlink to a commit in another repository.
    Submodule,
    /// Everything else (`100644`, `100755`, ...): a regular blob.
    Blob,
}

/// Raw octal file mode of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMode(u32);

impl EntryMode {
    const TREE: u32 = 0o040000;
    const SYMLINK: u32 = 0o120000;
    const SUBMODULE: u32 = 0o160000;

    /// Parse the ASCII-octal mode field of a tree entry.
    pub fn from_octal(bytes: &[u8]) -> Result<EntryMode, GitError> {
        if bytes.is_empty() || bytes.len() > 7 {
            return Err(GitError::InvalidTreeItem(format!(
                "bad mode `{}`",
                bytes.as_bstr()
            )));
        }
        let mut mode = 0u32;
        for b in bytes {
            if !(b'0'..=b'7').contains(b) {
                return Err(GitError::InvalidTreeItem(format!(
                    "bad mode `{}`",
                    bytes.as_bstr()
                )));
            }
            mode = mode * 8 + (b - b'0') as u32;
        }
        Ok(EntryMode(mode))
    }

    pub fn kind(&self) -> EntryKind {
        match self.0 {
            Self::TREE => EntryKind::Tree,
            Self::SYMLINK => EntryKind::Symlink,
            Self::SUBMODULE => EntryKind::Submodule,
            _ => EntryKind::Blob,
        }
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

/// One entry of a parsed tree; `name` borrows from the tree buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeEntry<'a> {
    pub mode: EntryMode,
    pub name: &'a BStr,
    pub oid: ObjectHash,
}

/// Iterate the entries of a raw tree body.
pub fn entries(data: &[u8]) -> TreeEntries<'_> {
    TreeEntries { rest: data }
}

pub struct TreeEntries<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for TreeEntries<'a> {
    type Item = Result<TreeEntry<'a>, GitError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let data = self.rest;
        let Some(sp) = memchr::memchr(b' ', data) else {
            self.rest = &[];
            return Some(Err(GitError::InvalidTreeItem(
                "entry without mode separator".to_string(),
            )));
        };
        let mode = match EntryMode::from_octal(&data[..sp]) {
            Ok(mode) => mode,
            Err(e) => {
                self.rest = &[];
                return Some(Err(e));
            }
        };
        let after_mode = &data[sp + 1..];
        let Some(nul) = memchr::memchr(b'\0', after_mode) else {
            self.rest = &[];
            return Some(Err(GitError::InvalidTreeItem(
                "entry without name terminator".to_string(),
            )));
        };
        let name = after_mode[..nul].as_bstr();
        let after_name = &after_mode[nul + 1..];
        if after_name.len() < 20 {
            self.rest = &[];
            return Some(Err(GitError::InvalidTreeItem(format!(
                "truncated object id after `{name}`"
            ))));
        }
        let oid = match ObjectHash::from_bytes(&after_name[..20]) {
            Ok(oid) => oid,
            Err(e) => {
                self.rest = &[];
                return Some(Err(e));
            }
        };
        self.rest = &after_name[20..];
        Some(Ok(TreeEntry { mode, name, oid }))
    }
}

/// Serialize entries into a canonical tree body. Entries are written in the
/// order given; callers wanting a tree git would produce must pass them in
/// git's sort order.
pub fn encode<'a, I>(entries: I) -> Vec<u8>
where
    I: IntoIterator<Item = (u32, &'a [u8], ObjectHash)>,
{
    let mut data = Vec::new();
    for (mode, name, oid) in entries {
        data.extend(format!("{mode:o}").as_bytes());
        data.push(b' ');
        data.extend(name);
        data.push(b'\0');
        data.extend(oid.as_ref());
    }
    data
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn some_oid() -> ObjectHash {
        ObjectHash::from_str("8ab686eafeb1f44702738c8b0f24f2567c36da6d").unwrap()
    }

    /// Encoded entries parse back with the same mode, name and id.
    #[test]
    fn test_parse_entries() {
        let oid = some_oid();
        let data = encode([
            (0o100644, b"file.txt".as_slice(), oid),
            (0o040000, b"dir".as_slice(), oid),
            (0o120000, b"link".as_slice(), oid),
            (0o160000, b"sub".as_slice(), oid),
        ]);
        let parsed: Vec<_> = entries(&data).map(|e| e.unwrap()).collect();
        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed[0].name, "file.txt");
        assert_eq!(parsed[0].mode.kind(), EntryKind::Blob);
        assert_eq!(parsed[1].mode.kind(), EntryKind::Tree);
        assert_eq!(parsed[2].mode.kind(), EntryKind::Symlink);
        assert_eq!(parsed[3].mode.kind(), EntryKind::Submodule);
        assert!(parsed.iter().all(|e| e.oid == oid));
    }

    /// Tree modes are written without a leading zero, as git does.
    #[test]
    fn test_encode_mode_format() {
        let data = encode([(0o040000, b"d0".as_slice(), some_oid())]);
        assert!(data.starts_with(b"40000 d0\0"));
        assert_eq!(data.len(), 5 + 1 + 2 + 1 + 20);
    }

    /// An empty body is an empty tree, not an error.
    #[test]
    fn test_empty_tree() {
        assert_eq!(entries(b"").count(), 0);
    }

    /// Missing space, missing NUL, and a short id are each rejected.
    #[test]
    fn test_malformed_entries() {
        assert!(entries(b"100644file").next().unwrap().is_err());
        assert!(entries(b"100644 file-without-nul").next().unwrap().is_err());
        let mut short = b"100644 f\0".to_vec();
        short.extend([0u8; 19]);
        assert!(entries(&short).next().unwrap().is_err());
        assert!(entries(b"10064x f\0").next().unwrap().is_err());
    }
}
