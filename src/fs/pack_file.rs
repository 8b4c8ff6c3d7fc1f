use crate::errors::*;
use crate::fs::FileBytes;
use crate::model::id::Id;
use crate::model::object::ObjectKind;
use flate2::read::ZlibDecoder;
use nom::IResult;
use nom::bytes::complete::{tag, take};
use nom::number::complete::be_u32;
use std::convert::TryFrom;
use std::io::Read;

const PACK_HEADER_LEN: u64 = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackEntryKind {
    Base(ObjectKind),
    /// Delta against the entry starting at this absolute offset.
    OfsDelta { base_offset: u64 },
    /// Delta against the object with this id, wherever it is stored.
    RefDelta { base: Id },
}

/// Header of one object inside a pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackEntry {
    pub kind: PackEntryKind,
    /// Inflated size of the payload (the delta itself for delta entries).
    pub size: usize,
    /// Absolute offset of the zlib stream.
    pub data_offset: usize,
}

/// A `.pack` file held in memory for the lifetime of the repository.
pub struct PackFile {
    name: String,
    data: FileBytes,
    version: u32,
    count: u32,
}

impl PackFile {
    pub fn from_bytes(name: &str, data: FileBytes) -> Result<Self> {
        let (_, (version, count)) = parse_header((*data).as_ref())
            .map_err(|_| corrupt(format!("{} has no pack header", name)))?;
        if version != 2 {
            return Err(ErrorKind::UnsupportedFormat(format!("{} is pack version {}", name, version)).into());
        }
        Ok(PackFile {
            name: name.to_owned(),
            data,
            version,
            count,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn version(&self) -> u32 {
        self.version
    }
    pub fn count(&self) -> u32 {
        self.count
    }

    fn bytes(&self) -> &[u8] {
        (*self.data).as_ref()
    }

    /// Decodes the object header found at `offset`.
    pub fn read_entry(&self, offset: u64) -> Result<PackEntry> {
        let data = self.bytes();
        if offset < PACK_HEADER_LEN || offset >= data.len() as u64 {
            return Err(corrupt(format!("offset {} is outside {}", offset, self.name)));
        }
        let input = &data[offset as usize..];
        let truncated = |_| corrupt(format!("truncated object header at {} in {}", offset, self.name));
        let (input, (type_tag, size)) = parse_object_header(input).map_err(truncated)?;
        let (input, kind) = match type_tag {
            1 => (input, PackEntryKind::Base(ObjectKind::Commit)),
            2 => (input, PackEntryKind::Base(ObjectKind::Tree)),
            3 => (input, PackEntryKind::Base(ObjectKind::Blob)),
            4 => (input, PackEntryKind::Base(ObjectKind::Tag)),
            6 => {
                let (input, distance) = parse_offset(input).map_err(truncated)?;
                if distance == 0 || distance >= offset {
                    return Err(corrupt(format!(
                        "delta at {} in {} points {} bytes back",
                        offset, self.name, distance
                    )));
                }
                (input, PackEntryKind::OfsDelta { base_offset: offset - distance })
            }
            7 => {
                let (input, base) = take(20u8)(input).map_err(truncated)?;
                (input, PackEntryKind::RefDelta { base: Id::from_raw(base) })
            }
            other => {
                return Err(corrupt(format!(
                    "invalid object type {} at {} in {}",
                    other, offset, self.name
                )))
            }
        };
        let size = usize::try_from(size).map_err(|_| {
            corrupt(format!("object at {} in {} declares {} bytes", offset, self.name, size))
        })?;
        Ok(PackEntry {
            kind,
            size,
            data_offset: data.len() - input.len(),
        })
    }

    /// Inflates the payload of an entry, which must match its declared size.
    pub fn inflate(&self, entry: &PackEntry) -> Result<Vec<u8>> {
        let input = &self.bytes()[entry.data_offset..];
        // the declared size is untrusted; never reserve more than the input could inflate to
        let mut data = Vec::with_capacity(entry.size.min(input.len().saturating_mul(1032)));
        ZlibDecoder::new(input)
            .take((entry.size as u64).saturating_add(1))
            .read_to_end(&mut data)
            .map_err(|e| corrupt(format!("failed to inflate object in {}: {}", self.name, e)))?;
        if data.len() != entry.size {
            return Err(corrupt(format!(
                "object in {} inflated to {} bytes, header says {}",
                self.name,
                data.len(),
                entry.size
            )));
        }
        Ok(data)
    }
}

fn parse_header(input: &[u8]) -> IResult<&[u8], (u32, u32)> {
    let (input, _) = tag("PACK")(input)?;
    let (input, version) = be_u32(input)?;
    let (input, count) = be_u32(input)?;
    Ok((input, (version, count)))
}

/// Type in bits 4..6 of the first byte, size in the low nibble followed by
/// 7 bit groups, least significant first.
fn parse_object_header(input: &[u8]) -> IResult<&[u8], (u8, u64)> {
    let (mut input, byte) = take(1u8)(input)?;
    let mut byte = byte[0];
    let object_type = (byte & 0b0111_0000) >> 4;
    let mut size = u64::from(byte & 0b0000_1111);
    let mut shift = 4;
    while byte >= 128u8 {
        if shift > 60 {
            return Err(nom::Err::Failure((input, nom::error::ErrorKind::TooLarge)));
        }
        let (rest, b) = take(1u8)(input)?;
        byte = b[0];
        input = rest;
        size |= u64::from(byte & 0b0111_1111) << shift;
        shift += 7;
    }
    Ok((input, (object_type, size)))
}

/// Big-endian base offset of an OFS_DELTA; every continuation adds one
/// before shifting so each value has a single encoding.
fn parse_offset(input: &[u8]) -> IResult<&[u8], u64> {
    let (mut input, byte) = take(1u8)(input)?;
    let mut byte = byte[0];
    let mut offset = u64::from(byte & 0b0111_1111);
    while byte >= 128u8 {
        if offset >= 1 << 56 {
            return Err(nom::Err::Failure((input, nom::error::ErrorKind::TooLarge)));
        }
        offset = (offset + 1) << 7;
        let (rest, b) = take(1u8)(input)?;
        byte = b[0];
        input = rest;
        offset += u64::from(byte & 0b0111_1111);
    }
    Ok((input, offset))
}
