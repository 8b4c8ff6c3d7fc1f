use crate::errors::*;
use nom::IResult;
use nom::bytes::complete::take;

/// Largest output a single copy instruction can describe, which bounds
/// how much a delta of a given length can expand to.
const MAX_COPY_LEN: u64 = 0x1_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaInstruction {
    /// Append the next `n` bytes of the delta stream.
    Insert(usize),
    /// Append `length` bytes of the base, starting at `offset`.
    Copy { offset: usize, length: usize },
}

/// Little-endian base 128 size, as used in delta headers.
pub fn parse_size(input: &[u8]) -> IResult<&[u8], u64> {
    let mut input = input;
    let mut size = 0u64;
    let mut shift = 0;
    loop {
        let (rest, byte) = take(1u8)(input)?;
        input = rest;
        if shift > 63 {
            return Err(nom::Err::Failure((input, nom::error::ErrorKind::TooLarge)));
        }
        size |= u64::from(byte[0] & 0x7f) << shift;
        shift += 7;
        if byte[0] & 0x80 == 0 {
            return Ok((input, size));
        }
    }
}

/// Reads the little-endian bytes selected by `flags`, one bit per byte.
fn parse_flagged(input: &[u8], flags: u8, width: usize) -> IResult<&[u8], usize> {
    let mut input = input;
    let mut value = 0usize;
    for i in 0..width {
        if flags & (1 << i) != 0 {
            let (rest, byte) = take(1u8)(input)?;
            input = rest;
            value |= (byte[0] as usize) << (8 * i);
        }
    }
    Ok((input, value))
}

/// Decodes one instruction. `None` marks the terminating zero byte.
pub fn parse_instruction(input: &[u8]) -> IResult<&[u8], Option<DeltaInstruction>> {
    let (input, byte) = take(1u8)(input)?;
    let opcode = byte[0];
    if opcode & 0x80 == 0 {
        if opcode == 0 {
            return Ok((input, None));
        }
        return Ok((input, Some(DeltaInstruction::Insert(opcode as usize))));
    }
    let (input, offset) = parse_flagged(input, opcode & 0x0f, 4)?;
    let (input, length) = parse_flagged(input, (opcode >> 4) & 0x07, 3)?;
    let length = if length == 0 { MAX_COPY_LEN as usize } else { length };
    Ok((input, Some(DeltaInstruction::Copy { offset, length })))
}

/// Rebuilds an object from its base and a decompressed delta payload.
pub fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
    let (rest, base_size) = parse_size(delta)
        .map_err(|_| corrupt("truncated delta base size"))?;
    let (mut rest, result_size) = parse_size(rest)
        .map_err(|_| corrupt("truncated delta result size"))?;
    if base_size != base.len() as u64 {
        return Err(corrupt(format!(
            "delta expects a base of {} bytes, base has {}",
            base_size,
            base.len()
        )));
    }
    if result_size > rest.len() as u64 * MAX_COPY_LEN {
        return Err(corrupt(format!("delta cannot produce {} bytes", result_size)));
    }
    let result_size = result_size as usize;
    let mut patched = Vec::with_capacity(result_size);

    while !rest.is_empty() {
        let (remaining, instruction) = parse_instruction(rest)
            .map_err(|_| corrupt("truncated delta instruction"))?;
        rest = remaining;
        let chunk = match instruction {
            None => break,
            Some(DeltaInstruction::Insert(length)) => {
                if rest.len() < length {
                    return Err(corrupt("delta insert runs past the end of the delta"));
                }
                let (data, remaining) = rest.split_at(length);
                rest = remaining;
                data
            }
            Some(DeltaInstruction::Copy { offset, length }) => offset
                .checked_add(length)
                .and_then(|end| base.get(offset..end))
                .ok_or_else(|| corrupt(format!("delta copies {}+{} outside its base", offset, length)))?,
        };
        if patched.len() + chunk.len() > result_size {
            return Err(corrupt("delta overwrites its declared size"));
        }
        patched.extend_from_slice(chunk);
    }

    if patched.len() != result_size {
        return Err(corrupt(format!(
            "delta produced {} of {} bytes",
            patched.len(),
            result_size
        )));
    }
    Ok(patched)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn encode_size(mut size: u64, out: &mut Vec<u8>) {
        loop {
            let byte = (size & 0x7f) as u8;
            size >>= 7;
            if size == 0 {
                out.push(byte);
                return;
            }
            out.push(byte | 0x80);
        }
    }

    /// Encodes a delta using the given instructions. Insert data is taken
    /// from `literal` in order.
    pub(crate) fn encode_delta(base_len: usize, result_len: usize, ops: &[DeltaInstruction], literal: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        encode_size(base_len as u64, &mut out);
        encode_size(result_len as u64, &mut out);
        let mut literal = literal;
        for op in ops {
            match *op {
                DeltaInstruction::Insert(n) => {
                    out.push(n as u8);
                    out.extend_from_slice(&literal[..n]);
                    literal = &literal[n..];
                }
                DeltaInstruction::Copy { offset, length } => {
                    let mut opcode = 0x80u8;
                    let mut args = Vec::new();
                    for i in 0..4 {
                        let byte = (offset >> (8 * i)) as u8;
                        if byte != 0 {
                            opcode |= 1 << i;
                            args.push(byte);
                        }
                    }
                    let length = if length == 0x10000 { 0 } else { length };
                    for i in 0..3 {
                        let byte = (length >> (8 * i)) as u8;
                        if byte != 0 {
                            opcode |= 0x10 << i;
                            args.push(byte);
                        }
                    }
                    out.push(opcode);
                    out.extend(args);
                }
            }
        }
        out
    }

    #[test]
    fn copies_and_inserts() {
        let base = b"the quick brown fox jumps over the lazy dog";
        let ops = [
            DeltaInstruction::Copy { offset: 0, length: 10 },
            DeltaInstruction::Insert(3),
            DeltaInstruction::Copy { offset: 15, length: 28 },
        ];
        let delta = encode_delta(base.len(), 41, &ops, b"red");
        assert_eq!(apply_delta(base, &delta).unwrap(), b"the quick red fox jumps over the lazy dog".to_vec());
    }

    #[test]
    fn copy_without_length_takes_64k() {
        let base = vec![7u8; 0x10010];
        let delta = encode_delta(base.len(), 0x10000, &[DeltaInstruction::Copy { offset: 0x10, length: 0x10000 }], b"");
        assert_eq!(apply_delta(&base, &delta).unwrap().len(), 0x10000);
    }

    #[test]
    fn decodes_instruction_flags() {
        // offset bytes 1 and 3, length byte 2
        let (rest, op) = parse_instruction(&[0x80 | 0x01 | 0x04 | 0x20, 0x34, 0x12, 0x02, 0xff]).unwrap();
        assert_eq!(op, Some(DeltaInstruction::Copy { offset: 0x12_0034, length: 0x0200 }));
        assert_eq!(rest, &[0xffu8][..]);
        assert_eq!(parse_instruction(&[0x05]).unwrap().1, Some(DeltaInstruction::Insert(5)));
        assert_eq!(parse_instruction(&[0x00, 1]).unwrap().1, None);
    }

    #[test]
    fn zero_byte_terminates() {
        let mut delta = encode_delta(4, 2, &[DeltaInstruction::Copy { offset: 1, length: 2 }], b"");
        delta.extend_from_slice(&[0, 3, b'x', b'y', b'z']);
        assert_eq!(apply_delta(b"abcd", &delta).unwrap(), b"bc".to_vec());
    }

    fn assert_corrupt(base: &[u8], delta: &[u8]) {
        match apply_delta(base, delta) {
            Err(Error(ErrorKind::Corrupt(_), _)) => {}
            other => panic!("expected Corrupt, got {:?}", other),
        }
    }

    #[test]
    fn base_size_must_match() {
        let delta = encode_delta(5, 2, &[DeltaInstruction::Copy { offset: 0, length: 2 }], b"");
        assert_corrupt(b"abcd", &delta);
    }

    #[test]
    fn overflowing_output_is_corrupt() {
        let delta = encode_delta(4, 3, &[DeltaInstruction::Copy { offset: 0, length: 4 }], b"");
        assert_corrupt(b"abcd", &delta);
        let delta = encode_delta(4, 1, &[DeltaInstruction::Insert(2)], b"xy");
        assert_corrupt(b"abcd", &delta);
    }

    #[test]
    fn short_output_is_corrupt() {
        let delta = encode_delta(4, 8, &[DeltaInstruction::Copy { offset: 0, length: 4 }], b"");
        assert_corrupt(b"abcd", &delta);
    }

    #[test]
    fn copy_outside_base_is_corrupt() {
        let delta = encode_delta(4, 4, &[DeltaInstruction::Copy { offset: 2, length: 4 }], b"");
        assert_corrupt(b"abcd", &delta);
    }

    #[test]
    fn truncated_insert_is_corrupt() {
        let mut delta = encode_delta(4, 6, &[], b"");
        delta.extend_from_slice(&[6, b'a', b'b']);
        assert_corrupt(b"abcd", &delta);
    }
}
