use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{take_until, tag};
use nom::combinator::{map, map_res};
use std::str::{self, FromStr};
use std::fmt::{Display, Formatter};
use crate::errors::*;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Commit => "commit",
            ObjectKind::Tree => "tree",
            ObjectKind::Blob => "blob",
            ObjectKind::Tag => "tag",
        }
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully reconstructed object bytes, after any delta chain was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}

impl ResolvedObject {
    /// Returns the payload if it has the requested kind.
    pub fn expect_kind(&self, want: ObjectKind) -> Result<&[u8]> {
        if self.kind == want {
            Ok(&self.data)
        } else {
            Err(ErrorKind::TypeMismatch(want, self.kind).into())
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct ObjectHeader {
    pub kind: ObjectKind,
    pub length: usize,
}

fn usize_from_str_bytes(input: &[u8]) -> Result<usize> {
    let str = str::from_utf8(input)?;
    if str.is_empty() || !str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(corrupt(format!("bad object size {:?}", str)));
    }
    usize::from_str(str).chain_err(|| ErrorKind::Corrupt("object size overflows".into()))
}

fn parse_length(input: &[u8]) -> IResult<&[u8], usize> {
    map_res(
        take_until("\0"),
        usize_from_str_bytes
    )(input)
}

pub fn parse_object_kind(input: &[u8]) -> IResult<&[u8], ObjectKind> {
    alt((
        map(tag("blob"), |_| ObjectKind::Blob),
        map(tag("commit"), |_| ObjectKind::Commit),
        map(tag("tree"), |_| ObjectKind::Tree),
        map(tag("tag"), |_| ObjectKind::Tag),
    ))(input)
}

/// Parses the `"<kind> <size>\0"` prefix of a loose object.
pub fn parse_header(input: &[u8]) -> IResult<&[u8], ObjectHeader> {
    let (input, kind) = parse_object_kind(input)?;
    let (input, _) = tag(" ")(input)?;
    let (input, length) = parse_length(input)?;
    let (input, _) = tag("\0")(input)?;
    Ok((input, ObjectHeader { kind, length }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let header = "commit 20\0";
        let expected = ObjectHeader { kind: ObjectKind::Commit, length: 20 };
        let parsed = parse_header(header.as_bytes());
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap(), ("".as_bytes(), expected));
    }

    #[test]
    fn header_rejects_bad_sizes() {
        assert!(parse_header(b"blob 1x\0").is_err());
        assert!(parse_header(b"blob -1\0").is_err());
        assert!(parse_header(b"blob \0").is_err());
        assert!(parse_header(b"blob 12").is_err());
        assert!(parse_header(b"bolb 12\0").is_err());
    }

    #[test]
    fn expect_kind_reports_mismatch() {
        let obj = ResolvedObject { kind: ObjectKind::Tree, data: vec![] };
        assert!(obj.expect_kind(ObjectKind::Tree).is_ok());
        match obj.expect_kind(ObjectKind::Commit) {
            Err(Error(ErrorKind::TypeMismatch(ObjectKind::Commit, ObjectKind::Tree), _)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
