//! Object model definitions for the walkable Git object kinds and the
//! byte-level parsers the size graph feeds on.
//!
//! The size graph never needs full object semantics: a commit is its root
//! tree plus its parents, a tag is its referent, a tree is its entry list.
//! The parsers here extract exactly that, borrowing from the raw object
//! buffer wherever possible.

pub mod commit;
pub mod tag;
pub mod tree;
pub mod types;

use bstr::ByteSlice;

use crate::errors::GitError;

/// Iterator over the `<key> SP <value> LF` header lines of a commit or tag
/// body, stopping at the blank line separating headers from the message (or
/// at end of data). Continuation lines (leading SP, e.g. multi-line gpgsig
/// payloads) are skipped.
pub(crate) struct HeaderLines<'a> {
    rest: &'a [u8],
}

pub(crate) fn header_lines(data: &[u8]) -> HeaderLines<'_> {
    HeaderLines { rest: data }
}

impl<'a> Iterator for HeaderLines<'a> {
    type Item = Result<(&'a [u8], &'a [u8]), GitError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.rest.is_empty() {
                return None;
            }
            let data = self.rest;
            let (line, rest) = match data.find_byte(b'\n') {
                Some(end) => (&data[..end], &data[end + 1..]),
                None => (data, &data[data.len()..]),
            };
            self.rest = rest;
            if line.is_empty() {
                // blank line: the message follows, headers are done
                self.rest = &[];
                return None;
            }
            if line[0] == b' ' {
                continue;
            }
            return match line.find_byte(b' ') {
                Some(sp) => Some(Ok((&line[..sp], &line[sp + 1..]))),
                None => Some(Err(GitError::SourceProtocol(format!(
                    "malformed header line `{}`",
                    line.as_bstr()
                )))),
            };
        }
    }
}
