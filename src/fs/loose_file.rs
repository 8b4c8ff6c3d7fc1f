use crate::errors::*;
use crate::fs::FileSystem;
use crate::model::id::Id;
use crate::model::object::{parse_header, ObjectHeader, ObjectKind};
use flate2::read::ZlibDecoder;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

// "commit " plus a 20 digit size and the NUL
const MAX_HEADER_LEN: usize = 28;

pub fn object_path(objects_dir: &Path, id: &Id) -> Result<PathBuf> {
    let (dir, file) = id
        .loose_parts()
        .ok_or_else(|| ErrorKind::BadId(id.to_string()))?;
    Ok(objects_dir.join(dir).join(file))
}

fn inflate_error(id: &Id, err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
            corrupt(format!("loose object {} failed to decompress: {}", id, err))
        }
        _ => err.into(),
    }
}

/// Streams the payload of a loose object, checking on the way that it is
/// exactly as long as its header declared.
pub struct LooseFileReader {
    reader: ZlibDecoder<Box<dyn Read + Send>>,
    header: ObjectHeader,
    remaining: usize,
}

impl LooseFileReader {
    /// Opens the object and consumes its `"<kind> <size>\0"` header.
    pub fn open<FS: FileSystem + ?Sized>(fs: &FS, objects_dir: &Path, id: &Id) -> Result<Self> {
        let path = object_path(objects_dir, id)?;
        let file = fs.open_file(&path).map_err(|e| -> Error {
            if e.kind() == io::ErrorKind::NotFound {
                ErrorKind::NotFound(format!("loose object {}", id)).into()
            } else {
                e.into()
            }
        })?;
        let mut reader = ZlibDecoder::new(file);
        let mut raw_header = Vec::with_capacity(MAX_HEADER_LEN);
        let mut byte = [0u8];
        while raw_header.last() != Some(&0) {
            if raw_header.len() == MAX_HEADER_LEN {
                return Err(corrupt(format!("loose object {} has an oversized header", id)));
            }
            reader.read_exact(&mut byte).map_err(|e| inflate_error(id, e))?;
            raw_header.push(byte[0]);
        }
        let (_, header) = parse_header(&raw_header)
            .map_err(|_| corrupt(format!("loose object {} has a malformed header", id)))?;
        Ok(LooseFileReader {
            reader,
            remaining: header.length,
            header,
        })
    }

    pub fn header(&self) -> &ObjectHeader {
        &self.header
    }

    /// Fails unless the object is of the requested kind.
    pub fn expect_kind(self, want: ObjectKind) -> Result<Self> {
        if self.header.kind == want {
            Ok(self)
        } else {
            Err(corrupt(format!("expected a {} object, header says {}", want, self.header.kind)))
        }
    }

    /// Reads the whole payload into memory.
    pub fn read_all(mut self, id: &Id) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(self.header.length);
        self.read_to_end(&mut data).map_err(|e| inflate_error(id, e))?;
        Ok(data)
    }
}

impl Read for LooseFileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.reader.read(buf)?;
        if len > self.remaining {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "object is longer than its declared size"));
        }
        if len == 0 && self.remaining > 0 && !buf.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "object is shorter than its declared size"));
        }
        self.remaining -= len;
        Ok(len)
    }
}
