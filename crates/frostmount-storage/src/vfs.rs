//! Virtual file system access
//!
//! All discovery and mounting goes through [`GameFileSystem`] using
//! `/`-separated virtual paths such as `/game/Data/layout.toc`. Parsers pick
//! their own byte order, so readers are plain byte streams.

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Seek};
use std::path::{Component, Path, PathBuf};

/// Seekable byte stream returned by [`GameFileSystem::open_file_read`]
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Owned reader handle; closed on drop
pub type FileReader = Box<dyn ReadSeek>;

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DirEntry {
    /// Entry name without its parent path
    pub name: String,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

/// File system the loader discovers and reads game data through
pub trait GameFileSystem: Send + Sync {
    /// Open a file for reading
    fn open_file_read(&self, path: &str) -> io::Result<FileReader>;

    /// Whether a regular file exists
    fn file_exists(&self, path: &str) -> bool;

    /// Whether a directory exists
    fn directory_exists(&self, path: &str) -> bool;

    /// Immediate children of a directory, sorted by name
    fn list_path(&self, path: &str) -> io::Result<Vec<DirEntry>>;

    /// Read a whole file
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        let mut reader = self.open_file_read(path)?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(data)
    }
}

/// Join virtual path segments with single separators
pub fn join(base: &str, child: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        child.trim_start_matches('/')
    )
}

/// Host directory exposed under a virtual prefix
#[derive(Debug, Clone)]
pub struct HostFileSystem {
    prefix: String,
    root: PathBuf,
}

impl HostFileSystem {
    /// Map `prefix` (e.g. `/game`) onto the host directory `root`
    pub fn new(prefix: impl Into<String>, root: impl AsRef<Path>) -> Self {
        Self {
            prefix: prefix.into().trim_end_matches('/').to_string(),
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Host directory backing the prefix
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let rest = path
            .strip_prefix(&self.prefix)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{path} is outside {}", self.prefix),
                )
            })?;

        let relative = Path::new(rest.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{path} escapes the game root"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl GameFileSystem for HostFileSystem {
    fn open_file_read(&self, path: &str) -> io::Result<FileReader> {
        let file = std::fs::File::open(self.resolve(path)?)?;
        Ok(Box::new(io::BufReader::new(file)))
    }

    fn file_exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|p| p.is_file())
    }

    fn directory_exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|p| p.is_dir())
    }

    fn list_path(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        let mut entries = std::fs::read_dir(self.resolve(path)?)?
            .map(|entry| {
                let entry = entry?;
                Ok(DirEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    is_dir: entry.file_type()?.is_dir(),
                })
            })
            .collect::<io::Result<Vec<_>>>()?;
        entries.sort();
        Ok(entries)
    }
}

/// In-memory file system
///
/// Directories exist implicitly whenever a file lives below them.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryFileSystem {
    /// Create an empty file system
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&self, path: &str, data: impl Into<Bytes>) {
        self.files.write().insert(normalize(path), data.into());
    }

    /// Remove a file
    pub fn remove(&self, path: &str) -> bool {
        self.files.write().remove(&normalize(path)).is_some()
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    /// Whether no files exist
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

impl GameFileSystem for MemoryFileSystem {
    fn open_file_read(&self, path: &str) -> io::Result<FileReader> {
        let data = self
            .files
            .read()
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn file_exists(&self, path: &str) -> bool {
        self.files.read().contains_key(&normalize(path))
    }

    fn directory_exists(&self, path: &str) -> bool {
        let prefix = format!("{}/", normalize(path));
        self.files
            .read()
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(key, _)| key.starts_with(&prefix))
    }

    fn list_path(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        let prefix = format!("{}/", normalize(path));
        let files = self.files.read();
        let mut entries: Vec<DirEntry> = files
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| {
                let rest = &key[prefix.len()..];
                match rest.split_once('/') {
                    Some((dir, _)) => DirEntry {
                        name: dir.to_string(),
                        is_dir: true,
                    },
                    None => DirEntry {
                        name: rest.to_string(),
                        is_dir: false,
                    },
                }
            })
            .collect();
        if entries.is_empty() {
            return Err(io::Error::new(io::ErrorKind::NotFound, path.to_string()));
        }
        entries.sort();
        entries.dedup();
        Ok(entries)
    }
}
