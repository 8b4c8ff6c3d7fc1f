use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::debug;

use crate::errors::*;
use crate::fs::delta::apply_delta;
use crate::fs::loose_file::LooseFileReader;
use crate::fs::pack_file::PackEntryKind;
use crate::fs::pack_set::{PackFailure, PackSet};
use crate::fs::{FileSystem, OsFs};
use super::commit::{parse_commit, Commit};
use super::id::Id;
use super::object::{ObjectKind, ResolvedObject};
use super::tree::{parse_tree, Tree};

/// Text git writes into `description` when a repository is created.
pub const DEFAULT_DESCRIPTION: &[u8] = b"Unnamed repository; edit this file 'description' to name the repository.\n";

/// Delta chains longer than this are treated as corrupt, which also ends
/// REF_DELTA cycles.
pub const MAX_DELTA_DEPTH: usize = 1024;

const ID_HEX_LEN: usize = 40;

#[derive(Debug, Clone)]
enum CachedObject {
    Commit(Arc<Commit>),
    Tree(Arc<Tree>),
}

impl CachedObject {
    fn kind(&self) -> ObjectKind {
        match self {
            CachedObject::Commit(_) => ObjectKind::Commit,
            CachedObject::Tree(_) => ObjectKind::Tree,
        }
    }
}

/// Exposes a pack-resolved blob as a reader without copying it.
struct SharedBytes(Arc<ResolvedObject>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0.data
    }
}

/// Read access to a bare repository (or a `.git` directory).
///
/// Objects are looked up in the decoded-object cache first, then as loose
/// objects and finally in the packs, which are loaded on the first miss.
/// Decoded commits and trees are kept for the lifetime of the value.
pub struct Repository<FS: FileSystem = OsFs> {
    path: PathBuf,
    objects_dir: PathBuf,
    fs: FS,
    packs: OnceLock<std::result::Result<PackSet, PackFailure>>,
    cache: RwLock<HashMap<Id, CachedObject>>,
    latest_commit: OnceLock<Id>,
}

impl Repository<OsFs> {
    /// Does not touch the filesystem; problems surface on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Repository::with_fs(path, OsFs)
    }
}

impl<FS: FileSystem> Repository<FS> {
    pub fn with_fs<P: AsRef<Path>>(path: P, fs: FS) -> Self {
        let path = path.as_ref().to_path_buf();
        Repository {
            objects_dir: path.join("objects"),
            path,
            fs,
            packs: OnceLock::new(),
            cache: RwLock::new(HashMap::new()),
            latest_commit: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// The `description` file without its trailing newline, or an empty
    /// string when it is missing or still git's placeholder.
    pub fn description(&self) -> String {
        match self.fs.read_file(&self.path.join("description")) {
            Ok(ref d) if d.as_slice() != DEFAULT_DESCRIPTION => {
                let d = d.strip_suffix(b"\n").unwrap_or(d);
                String::from_utf8_lossy(d).into_owned()
            }
            _ => String::new(),
        }
    }

    fn read_repo_file(&self, relative: &Path) -> Result<Vec<u8>> {
        self.fs.read_file(&self.path.join(relative)).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ErrorKind::NotFound(relative.display().to_string()).into()
            } else {
                e.into()
            }
        })
    }

    /// Follows the symbolic `HEAD` to the id of the tip commit.
    pub fn latest_commit_id(&self) -> Result<Id> {
        if let Some(id) = self.latest_commit.get() {
            return Ok(id.clone());
        }
        let head = self.read_repo_file(Path::new("HEAD"))?;
        let target = head
            .strip_prefix(b"ref: ")
            .ok_or_else(|| corrupt("HEAD is not a symbolic ref"))?;
        let target = trim_line(target);
        let target = Path::new(std::str::from_utf8(target)?);
        if target.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(corrupt(format!("HEAD points outside the repository: {}", target.display())));
        }
        let id = match self.read_repo_file(target) {
            Ok(content) => check_commit_id(trim_line(&content))?,
            Err(ref e) if e.is_not_found() => self.packed_ref(target)?,
            Err(e) => return Err(e),
        };
        debug!("{} resolves to {}", target.display(), id);
        Ok(self.latest_commit.get_or_init(|| id).clone())
    }

    /// Looks a ref up in `packed-refs`, used once `git gc` removed its file.
    fn packed_ref(&self, target: &Path) -> Result<Id> {
        let not_found = || -> Error { ErrorKind::NotFound(target.display().to_string()).into() };
        let packed = match self.read_repo_file(Path::new("packed-refs")) {
            Ok(packed) => packed,
            Err(ref e) if e.is_not_found() => return Err(not_found()),
            Err(e) => return Err(e),
        };
        let name = target.to_string_lossy();
        packed
            .split(|&b| b == b'\n')
            .map(trim_line)
            .find(|line| {
                line.len() > ID_HEX_LEN + 1
                    && line[ID_HEX_LEN] == b' '
                    && &line[ID_HEX_LEN + 1..] == name.as_bytes()
            })
            .ok_or_else(not_found)
            .and_then(|line| check_commit_id(&line[..ID_HEX_LEN]))
    }

    fn cached(&self, id: &Id) -> Option<CachedObject> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Adds a decoded object. Entries are never replaced, so the first
    /// decode of an id wins.
    fn remember(&self, id: &Id, object: CachedObject) -> CachedObject {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.clone())
            .or_insert(object)
            .clone()
    }

    pub fn commit(&self, id: &Id) -> Result<Arc<Commit>> {
        let cached = match self.cached(id) {
            Some(cached) => cached,
            None => {
                let commit = self.with_object(id, ObjectKind::Commit, |data| parse_commit(data, id))?;
                self.remember(id, CachedObject::Commit(Arc::new(commit)))
            }
        };
        match cached {
            CachedObject::Commit(commit) => Ok(commit),
            other => Err(ErrorKind::TypeMismatch(ObjectKind::Commit, other.kind()).into()),
        }
    }

    pub fn tree(&self, id: &Id) -> Result<Arc<Tree>> {
        let cached = match self.cached(id) {
            Some(cached) => cached,
            None => {
                let tree = self.with_object(id, ObjectKind::Tree, |data| parse_tree(data, id))?;
                self.remember(id, CachedObject::Tree(Arc::new(tree)))
            }
        };
        match cached {
            CachedObject::Tree(tree) => Ok(tree),
            other => Err(ErrorKind::TypeMismatch(ObjectKind::Tree, other.kind()).into()),
        }
    }

    /// Streams a blob. Blobs are never cached; loose ones are decompressed
    /// as the caller reads.
    pub fn blob(&self, id: &Id) -> Result<Box<dyn Read + Send>> {
        match LooseFileReader::open(&self.fs, &self.objects_dir, id) {
            Ok(reader) => Ok(Box::new(reader.expect_kind(ObjectKind::Blob)?)),
            Err(ref e) if e.is_not_found() => {
                let object = self.read_packed(id)?;
                object.expect_kind(ObjectKind::Blob)?;
                Ok(Box::new(Cursor::new(SharedBytes(object))))
            }
            Err(e) => Err(e),
        }
    }

    /// Runs `decode` over the payload of an object of the wanted kind.
    fn with_object<T, F>(&self, id: &Id, want: ObjectKind, decode: F) -> Result<T>
    where
        F: FnOnce(&[u8]) -> Result<T>,
    {
        match LooseFileReader::open(&self.fs, &self.objects_dir, id) {
            Ok(reader) => decode(&reader.expect_kind(want)?.read_all(id)?),
            Err(ref e) if e.is_not_found() => {
                let object = self.read_packed(id)?;
                decode(object.expect_kind(want)?)
            }
            Err(e) => Err(e),
        }
    }

    fn packs(&self) -> Result<&PackSet> {
        let loaded = self.packs.get_or_init(|| {
            PackSet::load(&self.fs, &self.objects_dir).map_err(|e| PackFailure::from_error(&e))
        });
        match loaded {
            Ok(packs) => Ok(packs),
            Err(failure) => Err(failure.to_error()),
        }
    }

    /// A loose object of any kind, or `None` when there is no such file.
    fn read_loose(&self, id: &Id) -> Result<Option<Arc<ResolvedObject>>> {
        match LooseFileReader::open(&self.fs, &self.objects_dir, id) {
            Ok(reader) => {
                let kind = reader.header().kind;
                let data = reader.read_all(id)?;
                Ok(Some(Arc::new(ResolvedObject { kind, data })))
            }
            Err(ref e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read_packed(&self, id: &Id) -> Result<Arc<ResolvedObject>> {
        let packs = self.packs()?;
        let entry = packs.find(id)?;
        self.resolve_packed(packs, entry.pack, entry.offset)
    }

    /// Rebuilds the object at `offset`. The delta chain is followed down
    /// to a base (or an already rebuilt object), then applied back up,
    /// remembering every intermediate result.
    fn resolve_packed(&self, packs: &PackSet, pack: usize, offset: u64) -> Result<Arc<ResolvedObject>> {
        let (mut pack, mut offset) = (pack, offset);
        let mut chain = Vec::new();
        let mut object = loop {
            if let Some(object) = packs.cached(pack, offset) {
                break object;
            }
            if chain.len() > MAX_DELTA_DEPTH {
                return Err(corrupt(format!("delta chain deeper than {}", MAX_DELTA_DEPTH)));
            }
            let file = packs.file(pack)?;
            let entry = file.read_entry(offset)?;
            let data = file.inflate(&entry)?;
            match entry.kind {
                PackEntryKind::Base(kind) => break packs.remember(pack, offset, ResolvedObject { kind, data }),
                PackEntryKind::OfsDelta { base_offset } => {
                    chain.push((pack, offset, data));
                    offset = base_offset;
                }
                PackEntryKind::RefDelta { base } => {
                    chain.push((pack, offset, data));
                    if let Some(loose) = self.read_loose(&base)? {
                        break loose;
                    }
                    let found = packs.find(&base)?;
                    pack = found.pack;
                    offset = found.offset;
                }
            }
        };
        while let Some((pack, offset, delta)) = chain.pop() {
            object = packs.remember(pack, offset, apply_delta_to(&object, &delta)?);
        }
        Ok(object)
    }
}

/// A delta result keeps the kind of its base.
fn apply_delta_to(base: &ResolvedObject, delta: &[u8]) -> Result<ResolvedObject> {
    Ok(ResolvedObject {
        kind: base.kind,
        data: apply_delta(&base.data, delta)?,
    })
}

fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn check_commit_id(content: &[u8]) -> Result<Id> {
    if content.len() != ID_HEX_LEN {
        return Err(ErrorKind::BadId(String::from_utf8_lossy(content).into_owned()).into());
    }
    Id::validate(content)
}
