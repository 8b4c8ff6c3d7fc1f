use crate::errors::*;
use crate::fs::pack_file::PackFile;
use crate::fs::pack_idx::{PackIdx, PackIndexEntry};
use crate::fs::FileSystem;
use crate::model::id::Id;
use crate::model::object::ResolvedObject;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Why a pack (or the whole pack list) could not be used. Kept apart from
/// `Error` so a failed load can be stored and reported again on every
/// later lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum PackFailure {
    Unsupported(String),
    Corrupt(String),
    Io(io::ErrorKind, String),
}

impl PackFailure {
    pub fn from_error(err: &Error) -> Self {
        match err.kind() {
            ErrorKind::UnsupportedFormat(reason) => PackFailure::Unsupported(reason.clone()),
            ErrorKind::Io(e) => PackFailure::Io(e.kind(), err.to_string()),
            _ => PackFailure::Corrupt(err.to_string()),
        }
    }

    pub fn to_error(&self) -> Error {
        match self {
            PackFailure::Unsupported(reason) => ErrorKind::UnsupportedFormat(reason.clone()).into(),
            PackFailure::Corrupt(reason) => ErrorKind::Corrupt(reason.clone()).into(),
            PackFailure::Io(kind, reason) => io::Error::new(*kind, reason.clone()).into(),
        }
    }
}

struct LoadedPack {
    idx: PackIdx,
    file: PackFile,
}

/// Every pack of a repository with its index, plus the objects already
/// rebuilt from them.
pub struct PackSet {
    packs: Vec<std::result::Result<LoadedPack, PackFailure>>,
    resolved: RwLock<HashMap<(usize, u64), Arc<ResolvedObject>>>,
}

impl PackSet {
    /// Finds the packs listed in `objects/info/packs`, falling back to the
    /// `.pack` files in `objects/pack`, and loads each of them. A pack that
    /// fails to load is remembered as unusable; only failing to list the
    /// packs at all is an error.
    pub fn load<FS: FileSystem + ?Sized>(fs: &FS, objects_dir: &Path) -> Result<PackSet> {
        let names = list_packs(fs, objects_dir)?;
        debug!("found {} pack(s) in {}", names.len(), objects_dir.display());
        let pack_dir = objects_dir.join("pack");
        let packs = names
            .iter()
            .enumerate()
            .map(|(n, name)| {
                load_pack(fs, &pack_dir, name, n).map_err(|e| {
                    warn!("pack {} is unusable: {}", name, e);
                    PackFailure::from_error(&e)
                })
            })
            .collect();
        Ok(PackSet {
            packs,
            resolved: RwLock::new(HashMap::new()),
        })
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }

    /// Looks the id up in every usable pack. When no pack has it and some
    /// pack could not be loaded, that failure is reported instead of a plain
    /// `NotFound`.
    pub fn find(&self, id: &Id) -> Result<&PackIndexEntry> {
        let mut failure = None;
        for pack in &self.packs {
            match pack {
                Ok(loaded) => {
                    if let Some(entry) = loaded.idx.lookup(id) {
                        return Ok(entry);
                    }
                }
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }
        match failure {
            Some(e) => Err(e.to_error()),
            None => Err(ErrorKind::NotFound(format!("object {}", id)).into()),
        }
    }

    pub fn file(&self, pack: usize) -> Result<&PackFile> {
        match self.packs.get(pack) {
            Some(Ok(loaded)) => Ok(&loaded.file),
            Some(Err(e)) => Err(e.to_error()),
            None => Err(corrupt(format!("no pack number {}", pack))),
        }
    }

    pub fn cached(&self, pack: usize, offset: u64) -> Option<Arc<ResolvedObject>> {
        self.resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(pack, offset))
            .cloned()
    }

    /// Stores a rebuilt object, keeping the first copy if another caller
    /// got there before us.
    pub fn remember(&self, pack: usize, offset: u64, object: ResolvedObject) -> Arc<ResolvedObject> {
        self.resolved
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((pack, offset))
            .or_insert_with(|| Arc::new(object))
            .clone()
    }
}

/// Prefixes an io error with context while keeping its kind.
fn annotate(err: io::Error, context: &str) -> io::Error {
    io::Error::new(err.kind(), format!("{}: {}", context, err))
}

fn list_packs<FS: FileSystem + ?Sized>(fs: &FS, objects_dir: &Path) -> Result<Vec<String>> {
    match fs.read_file(&objects_dir.join("info").join("packs")) {
        Ok(data) => {
            return Ok(data
                .split(|&b| b == b'\n')
                .filter(|line| line.len() > 7 && line.starts_with(b"P ") && line.ends_with(b".pack"))
                .map(|line| String::from_utf8_lossy(&line[2..]).into_owned())
                .filter(|name| !name.contains('/'))
                .collect());
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(annotate(e, "error reading objects/info/packs").into()),
    }
    match fs.list_dir(&objects_dir.join("pack")) {
        Ok(names) => Ok(names.into_iter().filter(|n| n.ends_with(".pack")).collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(annotate(e, "error listing objects/pack").into()),
    }
}

fn load_pack<FS: FileSystem + ?Sized>(fs: &FS, pack_dir: &Path, name: &str, n: usize) -> Result<LoadedPack> {
    let stem = &name[..name.len() - ".pack".len()];
    let idx_data = fs
        .read_file(&pack_dir.join(format!("{}.idx", stem)))
        .map_err(|e| annotate(e, &format!("error reading index of {}", name)))?;
    let idx = PackIdx::parse(&idx_data, n)?;
    let data = fs
        .map_file(&pack_dir.join(name))
        .map_err(|e| annotate(e, &format!("error opening {}", name)))?;
    let file = PackFile::from_bytes(name, data)?;
    debug!("loaded {} with {} objects", name, idx.len());
    Ok(LoadedPack { idx, file })
}
