use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use crate::errors::*;

/// An object id in its 40 character hexadecimal form.
///
/// Ids only ever come out of [`Id::validate`] or [`Id::from_raw`], so every
/// character is known to be an ASCII digit or letter and the id is safe to
/// splice into a filesystem path.
#[derive(Debug, Default, PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub struct Id(String);

impl Id {
    /// Checks that every byte is an ASCII digit or letter. Apart from
    /// rejecting an empty id, length is left to the caller, who slices out
    /// exactly the bytes holding the id.
    pub fn validate(bytes: &[u8]) -> Result<Id> {
        if !bytes.is_empty() && bytes.iter().all(u8::is_ascii_alphanumeric) {
            let id = std::str::from_utf8(bytes)?;
            Ok(Id(id.to_owned()))
        } else {
            Err(ErrorKind::BadId(String::from_utf8_lossy(bytes).into_owned()).into())
        }
    }

    /// Hex encodes a raw 20 byte id, as stored in trees, pack indexes and
    /// REF_DELTA headers.
    pub fn from_raw(bytes: &[u8]) -> Id {
        Id(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Splits the id into the loose object directory and file name.
    pub(crate) fn loose_parts(&self) -> Option<(&str, &str)> {
        if self.0.len() > 2 {
            Some(self.0.split_at(2))
        } else {
            None
        }
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(target: &str) -> Result<Self> {
        Id::validate(target.trim().as_bytes())
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}
