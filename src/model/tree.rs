use crate::model::id::Id;
use nom::IResult;
use nom::bytes::complete::{take_while1, tag, take_until, take};
use nom::character::is_digit;
use nom::combinator::{map, verify};
use crate::errors::*;

/// Appended to the names of directory entries.
pub const DIR_SUFFIX: char = '/';
/// Prepended to the names of symlink entries. Names are never empty and
/// never contain a slash, so a marked name carries exactly one marker.
pub const SYMLINK_PREFIX: char = '/';

const MODE_DIR: &[u8] = b"40000";
const MODE_LINK: &[u8] = b"120000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeEntry {
    name: String,
    id: Id,
}

impl TreeEntry {
    /// The entry name, carrying the directory or symlink marker.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
    pub fn id(&self) -> &Id {
        &self.id
    }
    pub fn kind(&self) -> EntryKind {
        if self.name.ends_with(DIR_SUFFIX) {
            EntryKind::Directory
        } else if self.name.starts_with(SYMLINK_PREFIX) {
            EntryKind::Symlink
        } else {
            EntryKind::File
        }
    }
    /// The bare name as stored in git, with any marker removed.
    pub fn file_name(&self) -> &str {
        match self.kind() {
            EntryKind::Directory => &self.name[..self.name.len() - DIR_SUFFIX.len_utf8()],
            EntryKind::Symlink => &self.name[SYMLINK_PREFIX.len_utf8()..],
            EntryKind::File => &self.name,
        }
    }
}

/// Tree entries in the order git stores them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tree {
    id: Id,
    entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn entries(&self) -> &[TreeEntry] {
        self.entries.as_slice()
    }

    /// Looks up an entry by its marked name, e.g. `"src/"` for a directory.
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

fn parse_id(input: &[u8]) -> IResult<&[u8], Id> {
    map(
        take(20u8),
        Id::from_raw
    )(input)
}

fn parse_entry(input: &[u8]) -> IResult<&[u8], TreeEntry> {
    let (input, mode) = take_while1(is_digit)(input)?;
    let (input, _) = tag(" ")(input)?;
    let (input, name) = verify(take_until("\0"), |name: &[u8]| {
        !name.is_empty() && !name.contains(&b'/')
    })(input)?;
    let (input, _) = tag("\0")(input)?;
    let (input, id) = parse_id(input)?;
    let name = String::from_utf8_lossy(name);
    let name = match mode {
        MODE_DIR => format!("{}{}", name, DIR_SUFFIX),
        MODE_LINK => format!("{}{}", SYMLINK_PREFIX, name),
        _ => name.into_owned(),
    };
    Ok((input, TreeEntry { name, id }))
}

/// Decodes a tree body. Every byte must belong to a complete entry.
pub fn parse_tree(input: &[u8], id: &Id) -> Result<Tree> {
    let mut entries = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        let offset = input.len() - rest.len();
        let (remaining, entry) = parse_entry(rest)
            .map_err(|_| corrupt(format!("tree {} has a malformed entry at byte {}", id, offset)))?;
        entries.push(entry);
        rest = remaining;
    }
    Ok(Tree {
        id: id.to_owned(),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_bytes(mode: &str, name: &str, id: &[u8; 20]) -> Vec<u8> {
        let mut buf = format!("{} {}\0", mode, name).into_bytes();
        buf.extend_from_slice(id);
        buf
    }

    fn tree_id() -> Id {
        "e4f31b37d03f304f38d6f1d6c545848c8d70194c".parse().unwrap()
    }

    #[test]
    fn test_parse_tree() {
        let mut buf = entry_bytes("100644", "README.md", &[0x91; 20]);
        buf.extend(entry_bytes("40000", "src", &[0x12; 20]));
        buf.extend(entry_bytes("120000", "link", &[0x34; 20]));
        buf.extend(entry_bytes("160000", "vendored", &[0x56; 20]));
        let tree = parse_tree(&buf, &tree_id()).unwrap();

        let names: Vec<&str> = tree.entries().iter().map(TreeEntry::name).collect();
        assert_eq!(names, vec!["README.md", "src/", "/link", "vendored"]);
        let kinds: Vec<EntryKind> = tree.entries().iter().map(TreeEntry::kind).collect();
        assert_eq!(kinds, vec![EntryKind::File, EntryKind::Directory, EntryKind::Symlink, EntryKind::File]);
        assert_eq!(tree.get("src/").unwrap().id().as_str(), "12".repeat(20));
        assert_eq!(tree.get("src/").unwrap().file_name(), "src");
        assert_eq!(tree.get("/link").unwrap().file_name(), "link");
        assert!(tree.get("src").is_none());
    }

    #[test]
    fn directory_and_file_modes_are_distinguished() {
        let mut buf = entry_bytes("40000", "docs", &[1; 20]);
        buf.extend(entry_bytes("100644", "docs.md", &[2; 20]));
        let tree = parse_tree(&buf, &tree_id()).unwrap();
        assert_eq!(tree.get("docs/").unwrap().kind(), EntryKind::Directory);
        assert_eq!(tree.get("docs.md").unwrap().kind(), EntryKind::File);
    }

    #[test]
    fn empty_tree_has_no_entries() {
        assert!(parse_tree(b"", &tree_id()).unwrap().entries().is_empty());
    }

    #[test]
    fn truncated_entries_are_corrupt() {
        let full = entry_bytes("100644", "a.txt", &[7; 20]);
        for cut in &[full.len() - 1, full.len() - 19, 12, 7, 3] {
            match parse_tree(&full[..*cut], &tree_id()) {
                Err(Error(ErrorKind::Corrupt(_), _)) => {}
                other => panic!("expected Corrupt at {}, got {:?}", cut, other),
            }
        }
        for bad_name in &["", "a/b"] {
            let buf = entry_bytes("120000", bad_name, &[7; 20]);
            assert!(matches!(parse_tree(&buf, &tree_id()), Err(Error(ErrorKind::Corrupt(_), _))), "{:?}", bad_name);
        }
        let mut missing_space = b"100644a.txt\0".to_vec();
        missing_space.extend_from_slice(&[7; 20]);
        assert!(parse_tree(&missing_space, &tree_id()).is_err());
    }
}
