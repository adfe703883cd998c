//! Annotated tag object parsing.
//!
//! For sizing purposes a tag is a typed pointer: the id it refers to and the
//! type of that referent, which decides whether a tag chain continues.

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::object::{header_lines, types::ObjectType},
};

/// The referent of one annotated tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub object_id: ObjectHash,
    pub object_type: ObjectType,
}

impl Tag {
    /// Parse a raw tag body. Both the `object` and `type` headers are
    /// required.
    pub fn from_bytes(data: &[u8]) -> Result<Tag, GitError> {
        let mut object_id: Option<ObjectHash> = None;
        let mut object_type: Option<ObjectType> = None;
        for header in header_lines(data) {
            let (key, value) = header.map_err(|e| GitError::InvalidTagObject(e.to_string()))?;
            match key {
                b"object" => {
                    object_id = Some(ObjectHash::from_hex_bytes(value).map_err(|e| {
                        GitError::InvalidTagObject(format!("bad object id: {e}"))
                    })?);
                }
                b"type" => {
                    let ty = ObjectType::from_bytes(value)
                        .map_err(|e| GitError::InvalidTagObject(e.to_string()))?;
                    if ty == ObjectType::Missing {
                        return Err(GitError::InvalidTagObject(
                            "referent type `missing`".to_string(),
                        ));
                    }
                    object_type = Some(ty);
                }
                _ => {}
            }
        }
        match (object_id, object_type) {
            (Some(object_id), Some(object_type)) => Ok(Tag {
                object_id,
                object_type,
            }),
            (None, _) => Err(GitError::InvalidTagObject(
                "missing object header".to_string(),
            )),
            (_, None) => Err(GitError::InvalidTagObject(
                "missing type header".to_string(),
            )),
        }
    }
}

/// Serialize a canonical tag body.
pub fn encode(
    object_id: ObjectHash,
    object_type: ObjectType,
    tag_name: &str,
    tagger: &str,
    message: &str,
) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend(b"object ");
    data.extend(object_id.to_string().as_bytes());
    data.push(b'\n');
    data.extend(b"type ");
    data.extend(object_type.to_bytes());
    data.push(b'\n');
    data.extend(b"tag ");
    data.extend(tag_name.as_bytes());
    data.push(b'\n');
    data.extend(b"tagger ");
    data.extend(tagger.as_bytes());
    data.push(b'\n');
    data.push(b'\n');
    data.extend(message.as_bytes());
    data
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    const TAGGER: &str = "T Agger <tagger@example.com> 1112911993 -0700";

    fn commit_oid() -> ObjectHash {
        ObjectHash::from_str("57d7685c60213a9da465cf900f31933be3a7ee39").unwrap()
    }

    /// Encoded tags parse back to their referent.
    #[test]
    fn test_from_bytes() {
        let data = encode(commit_oid(), ObjectType::Commit, "v1.0", TAGGER, "release\n");
        let tag = Tag::from_bytes(&data).unwrap();
        assert_eq!(tag.object_id, commit_oid());
        assert_eq!(tag.object_type, ObjectType::Commit);
    }

    /// Both referent headers are mandatory.
    #[test]
    fn test_from_bytes_missing_headers() {
        let no_type = format!("object {}\ntag v1\n\nmsg", commit_oid());
        assert!(Tag::from_bytes(no_type.as_bytes()).is_err());
        assert!(Tag::from_bytes(b"type commit\ntag v1\n\nmsg").is_err());
    }

    /// An unknown referent type is rejected.
    #[test]
    fn test_from_bytes_bad_type() {
        let data = format!("object {}\ntype wobble\ntag v1\n\nmsg", commit_oid());
        assert!(Tag::from_bytes(data.as_bytes()).is_err());
    }
}
