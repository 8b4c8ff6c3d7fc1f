use chrono::{DateTime, FixedOffset, TimeZone};
use std::str;

use crate::errors::*;
use crate::model::id::Id;

#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    id: Id,
    tree: Id,
    parent: Option<Id>,
    message: String,
    time: DateTime<FixedOffset>,
}

impl Commit {
    pub fn id(&self) -> &Id {
        &self.id
    }
    pub fn tree(&self) -> &Id {
        &self.tree
    }
    /// The first parent. Merge parents beyond the first are not recorded.
    pub fn parent(&self) -> Option<&Id> {
        self.parent.as_ref()
    }
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
    /// Committer time, in the committer's own zone.
    pub fn time(&self) -> &DateTime<FixedOffset> {
        &self.time
    }
}

/// Returns the value of a `<key> <value>` header line, `None` when the line
/// holds some other header.
fn header_value<'a>(line: &'a [u8], key: &str) -> Result<Option<&'a [u8]>> {
    let key = key.as_bytes();
    if !line.starts_with(key) || (line.len() > key.len() && line[key.len()] != b' ') {
        return Ok(None);
    }
    if line.len() <= key.len() + 1 {
        return Err(corrupt(format!("truncated {} header", String::from_utf8_lossy(key))));
    }
    Ok(Some(&line[key.len() + 1..]))
}

fn parse_zone(zone: &[u8]) -> Result<FixedOffset> {
    let bad_zone = || corrupt(format!("invalid timezone {:?}", String::from_utf8_lossy(zone)));
    if zone.len() != 5 || !zone[1..].iter().all(u8::is_ascii_digit) {
        return Err(bad_zone());
    }
    let sign = match zone[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return Err(bad_zone()),
    };
    let digits = |range: std::ops::Range<usize>| {
        zone[range].iter().fold(0i32, |acc, d| acc * 10 + i32::from(d - b'0'))
    };
    let (hours, mins) = (digits(1..3), digits(3..5));
    FixedOffset::east_opt(sign * (hours * 3600 + mins * 60)).ok_or_else(bad_zone)
}

/// Parses `<name> <email> <unix-seconds> <±HHMM>` into a zoned timestamp.
fn parse_committer_time(value: &[u8]) -> Result<DateTime<FixedOffset>> {
    let mut fields = value.rsplitn(3, |&b| b == b' ');
    let zone = fields.next().ok_or_else(|| corrupt("missing committer timezone"))?;
    let seconds = fields.next().ok_or_else(|| corrupt("missing committer timestamp"))?;
    if fields.next().is_none() {
        return Err(corrupt("missing committer identity"));
    }
    let offset = parse_zone(zone)?;
    let seconds: i64 = str::from_utf8(seconds)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| corrupt("invalid committer timestamp"))?;
    offset
        .timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| corrupt(format!("committer timestamp {} out of range", seconds)))
}

/// Decodes a commit body. Of each recognised header only the first
/// occurrence counts, which reduces merges to their first parent.
pub fn parse_commit(input: &[u8], id: &Id) -> Result<Commit> {
    let mut tree = None;
    let mut parent = None;
    let mut time = None;
    let mut rest = input;
    loop {
        let end = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| corrupt(format!("commit {} has no message separator", id)))?;
        let line = &rest[..end];
        rest = &rest[end + 1..];
        if line.is_empty() {
            break;
        }
        if let Some(value) = header_value(line, "tree")? {
            if tree.is_none() {
                tree = Some(Id::validate(value)
                    .chain_err(|| ErrorKind::Corrupt(format!("commit {} has an invalid tree id", id)))?);
            }
        } else if let Some(value) = header_value(line, "parent")? {
            if parent.is_none() {
                parent = Some(Id::validate(value)
                    .chain_err(|| ErrorKind::Corrupt(format!("commit {} has an invalid parent id", id)))?);
            }
        } else if let Some(value) = header_value(line, "committer")? {
            if time.is_none() {
                time = Some(parse_committer_time(value)?);
            }
        }
    }
    let message = rest.strip_suffix(b"\n").unwrap_or(rest);
    Ok(Commit {
        id: id.to_owned(),
        tree: tree.ok_or_else(|| corrupt(format!("commit {} has no tree", id)))?,
        parent,
        message: String::from_utf8_lossy(message).into_owned(),
        time: time.ok_or_else(|| corrupt(format!("commit {} has no committer", id)))?,
    })
}
