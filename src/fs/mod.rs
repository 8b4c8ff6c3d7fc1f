use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use memmap::Mmap;

pub mod delta;
pub mod loose_file;
pub mod pack_file;
pub mod pack_idx;
pub mod pack_set;

/// Bytes of a whole file, either memory mapped or held in memory.
pub type FileBytes = Box<dyn AsRef<[u8]> + Send + Sync>;

/// Read-only access to the files of a repository.
///
/// Every handle is scoped to the call (or to the returned reader), so
/// nothing stays open once the caller lets go of the result.
pub trait FileSystem: Send + Sync {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn open_file(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;
    fn map_file(&self, path: &Path) -> io::Result<FileBytes>;
    /// Names of the entries directly inside `path`.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OsFs;

impl FileSystem for OsFs {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn open_file(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(path)?))
    }

    fn map_file(&self, path: &Path) -> io::Result<FileBytes> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            // zero length maps are rejected on most platforms
            return Ok(Box::new(Vec::new()));
        }
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Box::new(mmap))
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

/// An in-memory filesystem, keyed by full path.
#[derive(Debug, Default, Clone)]
pub struct MemFs {
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl MemFs {
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P, content: Vec<u8>) {
        self.files.insert(path.as_ref().to_path_buf(), content);
    }

    fn get(&self, path: &Path) -> io::Result<&Vec<u8>> {
        self.files.get(path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} does not exist", path.display()))
        })
    }
}

impl FileSystem for MemFs {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.get(path).map(Clone::clone)
    }

    fn open_file(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        let content = self.get(path)?.clone();
        Ok(Box::new(io::Cursor::new(content)))
    }

    fn map_file(&self, path: &Path) -> io::Result<FileBytes> {
        Ok(Box::new(self.get(path)?.clone()))
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names: Vec<String> = self
            .files
            .keys()
            .filter_map(|p| {
                let rest = p.strip_prefix(path).ok()?;
                rest.components().next().map(|c| c.as_os_str().to_string_lossy().into_owned())
            })
            .collect();
        if names.is_empty() {
            return Err(io::Error::new(io::ErrorKind::NotFound, format!("{} does not exist", path.display())));
        }
        names.dedup();
        Ok(names)
    }
}
