#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use gitweb::model::id::Id;
use std::io::Write;
use std::path::PathBuf;

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// A made-up raw id whose first and last bytes are `n`.
pub fn raw_id(n: u8) -> [u8; 20] {
    let mut id = [0x11u8; 20];
    id[0] = n;
    id[19] = n;
    id
}

pub fn id(n: u8) -> Id {
    Id::from_raw(&raw_id(n))
}

/// Path (relative to the git directory) and content of a loose object.
pub fn loose_object(raw: &[u8; 20], kind: &str, data: &[u8]) -> (PathBuf, Vec<u8>) {
    let id = Id::from_raw(raw);
    let hex = id.as_str();
    let mut content = format!("{} {}\0", kind, data.len()).into_bytes();
    content.extend_from_slice(data);
    (PathBuf::from("objects").join(&hex[..2]).join(&hex[2..]), deflate(&content))
}

pub fn tree_data(entries: &[(&str, &str, &[u8; 20])]) -> Vec<u8> {
    let mut data = Vec::new();
    for (mode, name, raw) in entries {
        data.extend_from_slice(format!("{} {}\0", mode, name).as_bytes());
        data.extend_from_slice(&raw[..]);
    }
    data
}

pub fn commit_data(tree: &[u8; 20], parent: Option<&[u8; 20]>, time: i64, message: &str) -> Vec<u8> {
    let mut data = format!("tree {}\n", Id::from_raw(tree));
    if let Some(parent) = parent {
        data.push_str(&format!("parent {}\n", Id::from_raw(parent)));
    }
    data.push_str(&format!("author A U Thor <author@example.com> {} +0100\n", time));
    data.push_str(&format!("committer C O Mitter <committer@example.com> {} +0100\n\n", time));
    data.push_str(message);
    data.into_bytes()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Copy(usize, usize),
    Insert(Vec<u8>),
}

pub fn apply_by_hand(base: &[u8], ops: &[Op]) -> Vec<u8> {
    let mut out = Vec::new();
    for op in ops {
        match op {
            Op::Copy(offset, length) => out.extend_from_slice(&base[*offset..*offset + *length]),
            Op::Insert(data) => out.extend_from_slice(data),
        }
    }
    out
}

fn encode_size(mut size: usize, out: &mut Vec<u8>) {
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

pub fn encode_delta(base: &[u8], ops: &[Op]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_size(base.len(), &mut out);
    encode_size(apply_by_hand(base, ops).len(), &mut out);
    for op in ops {
        match op {
            Op::Insert(data) => {
                out.push(data.len() as u8);
                out.extend_from_slice(data);
            }
            Op::Copy(offset, length) => {
                let mut opcode = 0x80u8;
                let mut args = Vec::new();
                for i in 0..4 {
                    let byte = (offset >> (8 * i)) as u8;
                    if byte != 0 {
                        opcode |= 1 << i;
                        args.push(byte);
                    }
                }
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

fn encode_object_header(type_tag: u8, size: usize, out: &mut Vec<u8>) {
    let mut size = size;
    let mut byte = (type_tag << 4) | (size & 0x0f) as u8;
    size >>= 4;
    while size > 0 {
        out.push(byte | 0x80);
        byte = (size & 0x7f) as u8;
        size >>= 7;
    }
    out.push(byte);
}

fn encode_offset(mut distance: u64, out: &mut Vec<u8>) {
    let mut bytes = vec![(distance & 0x7f) as u8];
    distance >>= 7;
    while distance > 0 {
        distance -= 1;
        bytes.push(0x80 | (distance & 0x7f) as u8);
        distance >>= 7;
    }
    bytes.reverse();
    out.extend(bytes);
}

/// Version 2 index for `(raw id, offset)` pairs, which must be sorted.
pub fn build_idx(objects: &[([u8; 20], u64)]) -> Vec<u8> {
    let mut buf = b"\xfftOc".to_vec();
    buf.extend_from_slice(&2u32.to_be_bytes());
    for byte in 0..256usize {
        let below = objects.iter().filter(|(id, _)| (id[0] as usize) <= byte).count() as u32;
        buf.extend_from_slice(&below.to_be_bytes());
    }
    for (id, _) in objects {
        buf.extend_from_slice(id);
    }
    for _ in objects {
        buf.extend_from_slice(&0u32.to_be_bytes());
    }
    let mut large = Vec::new();
    for (_, offset) in objects {
        if *offset >= 0x8000_0000 {
            buf.extend_from_slice(&(0x8000_0000 | large.len() as u32).to_be_bytes());
            large.push(*offset);
        } else {
            buf.extend_from_slice(&(*offset as u32).to_be_bytes());
        }
    }
    for offset in large {
        buf.extend_from_slice(&offset.to_be_bytes());
    }
    buf.extend_from_slice(&[0u8; 40]);
    buf
}

pub const COMMIT: u8 = 1;
pub const TREE: u8 = 2;
pub const BLOB: u8 = 3;

/// Assembles a version 2 pack and its index in memory.
pub struct PackBuilder {
    data: Vec<u8>,
    index: Vec<([u8; 20], u64)>,
}

impl PackBuilder {
    pub fn new() -> Self {
        PackBuilder::with_version(2)
    }

    pub fn with_version(version: u32) -> Self {
        let mut data = b"PACK".to_vec();
        data.extend_from_slice(&version.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        PackBuilder {
            data,
            index: Vec::new(),
        }
    }

    fn header(&mut self, raw: [u8; 20], type_tag: u8, size: usize) -> u64 {
        let offset = self.data.len() as u64;
        self.index.push((raw, offset));
        encode_object_header(type_tag, size, &mut self.data);
        offset
    }

    pub fn base(&mut self, raw: [u8; 20], type_tag: u8, payload: &[u8]) -> u64 {
        let offset = self.header(raw, type_tag, payload.len());
        self.data.extend(deflate(payload));
        offset
    }

    pub fn ofs_delta(&mut self, raw: [u8; 20], base_offset: u64, delta: &[u8]) -> u64 {
        let offset = self.header(raw, 6, delta.len());
        encode_offset(offset - base_offset, &mut self.data);
        self.data.extend(deflate(delta));
        offset
    }

    pub fn ref_delta(&mut self, raw: [u8; 20], base: &[u8; 20], delta: &[u8]) -> u64 {
        let offset = self.header(raw, 7, delta.len());
        self.data.extend_from_slice(&base[..]);
        self.data.extend(deflate(delta));
        offset
    }

    /// The pack and idx bytes.
    pub fn finish(mut self) -> (Vec<u8>, Vec<u8>) {
        let count = self.index.len() as u32;
        self.data[8..12].copy_from_slice(&count.to_be_bytes());
        self.data.extend_from_slice(&[0u8; 20]);
        self.index.sort();
        (self.data, build_idx(&self.index))
    }
}
