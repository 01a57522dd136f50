//! # Registry — the process-wide open-file table
//!
//! A table is routinely reached through several live handles at once (three
//! simultaneous cursors over the same data is the normal test workload).
//! Giving each handle its own OS descriptor would mean independent seek
//! pointers onto the same bytes; instead, all handles onto one path share a
//! single [`DbFile`], and the registry reference-counts it.
//!
//! Paths are compared case-insensitively, so `Foo.data` and `foo.data`
//! resolve to the same descriptor.
//!
//! Every `DbFile` operation seeks before acting, and the seek+I/O pair runs
//! under the file's own mutex, so interleaved operations from sibling
//! handles never observe each other's file position. The engine itself is
//! single-threaded; the mutexes are what that model costs when spelled in
//! Rust.
//!
//! Handles are RAII: dropping a [`DbFileHandle`] releases its reference,
//! and the descriptor closes when the last reference goes.

use log::debug;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;

/// Errors raised while opening a data file.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The OS refused to open (or create) the file.
    #[error("cannot open {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: io::Error,
    },

    /// A directory on the path could not be created.
    #[error("cannot create directory {path}: {source}")]
    MkdirFailed {
        path: PathBuf,
        source: io::Error,
    },
}

/// One shared data file: the descriptor plus its identity in the registry.
///
/// All I/O goes through positioned operations that seek first; the file
/// offset is never trusted across calls.
#[derive(Debug)]
pub struct DbFile {
    key: String,
    path: PathBuf,
    file: Mutex<File>,
}

impl DbFile {
    /// The path this file was opened under.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file length in bytes.
    pub fn len(&self) -> io::Result<u64> {
        let mut f = self.file.lock().expect("db file lock poisoned");
        f.seek(SeekFrom::End(0))
    }

    /// Returns `true` when the file holds no bytes at all.
    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads exactly `buf.len()` bytes starting at `pos`.
    ///
    /// A short read surfaces as `io::ErrorKind::UnexpectedEof`, which the
    /// frame codec maps onto its own error kinds.
    pub fn read_exact_at(&self, pos: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut f = self.file.lock().expect("db file lock poisoned");
        f.seek(SeekFrom::Start(pos))?;
        f.read_exact(buf)
    }

    /// Writes all of `data` starting at `pos`.
    pub fn write_all_at(&self, pos: u64, data: &[u8]) -> io::Result<()> {
        let mut f = self.file.lock().expect("db file lock poisoned");
        f.seek(SeekFrom::Start(pos))?;
        f.write_all(data)
    }

    /// Appends `data` at the end of the file, returning the offset it was
    /// written at.
    pub fn append(&self, data: &[u8]) -> io::Result<u64> {
        let mut f = self.file.lock().expect("db file lock poisoned");
        let pos = f.seek(SeekFrom::End(0))?;
        f.write_all(data)?;
        Ok(pos)
    }

    /// Drops every byte, keeping the descriptor (and thus every sibling
    /// handle) valid.
    pub fn truncate(&self) -> io::Result<()> {
        let f = self.file.lock().expect("db file lock poisoned");
        f.set_len(0)
    }
}

/// A counted reference to a shared [`DbFile`].
///
/// Dereferences to the file; dropping it releases the registry reference.
#[derive(Debug)]
pub struct DbFileHandle {
    inner: Arc<DbFile>,
}

impl Deref for DbFileHandle {
    type Target = DbFile;

    fn deref(&self) -> &DbFile {
        &self.inner
    }
}

impl Drop for DbFileHandle {
    fn drop(&mut self) {
        release(&self.inner.key);
    }
}

struct Entry {
    file: Arc<DbFile>,
    refs: usize,
}

fn registry() -> &'static Mutex<HashMap<String, Entry>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Entry>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn canonical_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

/// Opens (or re-uses) the data file at `path`.
///
/// Missing directories on the path are created first. If another handle
/// already holds the same path (compared case-insensitively), its
/// descriptor is shared and the reference count bumped; otherwise the file
/// is opened read-write, created if absent.
pub fn open_table_file(path: &Path) -> Result<DbFileHandle, RegistryError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|source| RegistryError::MkdirFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let key = canonical_key(path);
    let mut map = registry().lock().expect("registry lock poisoned");

    if let Some(entry) = map.get_mut(&key) {
        entry.refs += 1;
        debug!("reusing descriptor for {} (refs {})", path.display(), entry.refs);
        return Ok(DbFileHandle {
            inner: Arc::clone(&entry.file),
        });
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .map_err(|source| RegistryError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;

    debug!("opened {}", path.display());
    let shared = Arc::new(DbFile {
        key: key.clone(),
        path: path.to_path_buf(),
        file: Mutex::new(file),
    });
    map.insert(
        key,
        Entry {
            file: Arc::clone(&shared),
            refs: 1,
        },
    );

    Ok(DbFileHandle { inner: shared })
}

fn release(key: &str) {
    let mut map = registry().lock().expect("registry lock poisoned");
    if let Some(entry) = map.get_mut(key) {
        entry.refs -= 1;
        if entry.refs == 0 {
            debug!("closing {}", key);
            map.remove(key);
        }
    }
}
