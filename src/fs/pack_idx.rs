use crate::errors::*;
use crate::model::id::Id;
use nom::IResult;
use nom::bytes::complete::{tag, take};
use nom::combinator::map;
use nom::multi::count;
use nom::number::complete::{be_u32, be_u64};

const IDX_MAGIC: &[u8] = b"\xfftOc";
const LARGE_OFFSET_FLAG: u32 = 0x8000_0000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackIndexEntry {
    pub id: Id,
    /// Position of the owning pack in the repository's pack list.
    pub pack: usize,
    pub offset: u64,
}

/// A parsed version 2 `.idx` file.
#[derive(Debug)]
pub struct PackIdx {
    fanout: [u32; 256],
    entries: Vec<PackIndexEntry>,
}

impl PackIdx {
    pub fn parse(input: &[u8], pack: usize) -> Result<PackIdx> {
        let (input, version) = parse_signature(input)
            .map_err(|_| ErrorKind::UnsupportedFormat("pack index version 1 is not supported".into()))?;
        if version != 2 {
            return Err(ErrorKind::UnsupportedFormat(format!("pack index version {}", version)).into());
        }
        let (_, (fanout, entries)) = parse_tables(input, pack)
            .map_err(|_| corrupt("truncated pack index"))?;
        let entries = entries?;
        Ok(PackIdx { fanout, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Binary search inside the fan-out bucket of the id's first byte.
    pub fn lookup(&self, id: &Id) -> Option<&PackIndexEntry> {
        let first_byte = u8::from_str_radix(id.as_str().get(..2)?, 16).ok()? as usize;
        let lo = if first_byte > 0 {
            self.fanout[first_byte - 1] as usize
        } else {
            0
        };
        let hi = (self.fanout[first_byte] as usize).min(self.entries.len());
        let bucket = self.entries.get(lo..hi)?;
        bucket
            .binary_search_by(|e| e.id.cmp(id))
            .ok()
            .map(|n| &bucket[n])
    }
}

fn parse_signature(input: &[u8]) -> IResult<&[u8], u32> {
    let (input, _) = tag(IDX_MAGIC)(input)?;
    be_u32(input)
}

fn parse_fanout(input: &[u8]) -> IResult<&[u8], [u32; 256]> {
    let mut fanout = [0u32; 256];
    let mut rest = input;
    for slot in fanout.iter_mut() {
        let (input, value) = be_u32(rest)?;
        *slot = value;
        rest = input;
    }
    Ok((rest, fanout))
}

fn parse_raw_id(input: &[u8]) -> IResult<&[u8], Id> {
    map(take(20u8), Id::from_raw)(input)
}

/// Reads everything after the version word. Offsets pointing into the
/// large offset table are resolved here; a dangling one is reported through
/// the inner result since it is a content error rather than a short read.
fn parse_tables(input: &[u8], pack: usize) -> IResult<&[u8], ([u32; 256], Result<Vec<PackIndexEntry>>)> {
    let (input, fanout) = parse_fanout(input)?;
    let size = fanout[255] as usize;
    // ids, crcs and offsets must all be present before anything is allocated
    if input.len() / 28 < size {
        return Err(nom::Err::Error((input, nom::error::ErrorKind::Eof)));
    }
    let (input, ids) = count(parse_raw_id, size)(input)?;
    let (input, _crcs) = take(size * 4)(input)?;
    let (input, offsets) = count(be_u32, size)(input)?;
    let large_count = offsets
        .iter()
        .filter(|o| *o & LARGE_OFFSET_FLAG != 0)
        .map(|o| (o & !LARGE_OFFSET_FLAG) as usize + 1)
        .max()
        .unwrap_or(0);
    let (input, large_offsets) = count(be_u64, large_count)(input)?;

    let entries = ids
        .into_iter()
        .zip(offsets)
        .map(|(id, offset)| -> Result<PackIndexEntry> {
            let offset = if offset & LARGE_OFFSET_FLAG != 0 {
                let index = (offset & !LARGE_OFFSET_FLAG) as usize;
                *large_offsets
                    .get(index)
                    .ok_or_else(|| corrupt(format!("large offset {} out of range", index)))?
            } else {
                u64::from(offset)
            };
            Ok(PackIndexEntry { id, pack, offset })
        })
        .collect();
    Ok((input, (fanout, entries)))
}
