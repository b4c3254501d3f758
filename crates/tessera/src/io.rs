//! Filesystem access used by the build.
//!
//! Everything the orchestrator does to the disk goes through [`FileIo`], so a
//! build can run against [`MemoryIo`] in tests and produce a deterministic set
//! of `(destination, content)` pairs without touching the filesystem.

use crate::error::{IoContext, Result, TesseraError};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use walkdir::WalkDir;

/// Files whose presence marks a project root.
pub const ROOT_MARKERS: &[&str] = &["tessera.toml", "Cargo.toml"];

pub trait FileIo: Send + Sync {
    /// Walks up from `start` to the first folder holding one of [`ROOT_MARKERS`].
    fn resolve_root(&self, start: &Path) -> Result<PathBuf>;

    /// All files below `root`, sorted by path.
    fn find_files(&self, root: &Path) -> Result<Vec<PathBuf>>;

    fn delete_path(&self, path: &Path) -> Result<()>;

    /// Writes `content`, creating parent folders as needed.
    fn write(&self, path: &Path, content: &str) -> Result<()>;

    fn mkpath(&self, path: &Path) -> Result<()>;

    fn copy(&self, from: &Path, to: &Path) -> Result<()>;

    fn creation_date(&self, path: &Path) -> Option<DateTime<Utc>>;

    fn modification_date(&self, path: &Path) -> Option<DateTime<Utc>>;
}

/// Lets a caller keep a handle on the io it gave to a [`crate::Site`].
impl<T: FileIo + ?Sized> FileIo for Arc<T> {
    fn resolve_root(&self, start: &Path) -> Result<PathBuf> {
        (**self).resolve_root(start)
    }

    fn find_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        (**self).find_files(root)
    }

    fn delete_path(&self, path: &Path) -> Result<()> {
        (**self).delete_path(path)
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        (**self).write(path, content)
    }

    fn mkpath(&self, path: &Path) -> Result<()> {
        (**self).mkpath(path)
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        (**self).copy(from, to)
    }

    fn creation_date(&self, path: &Path) -> Option<DateTime<Utc>> {
        (**self).creation_date(path)
    }

    fn modification_date(&self, path: &Path) -> Option<DateTime<Utc>> {
        (**self).modification_date(path)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiskIo;

impl FileIo for DiskIo {
    fn resolve_root(&self, start: &Path) -> Result<PathBuf> {
        start
            .ancestors()
            .find(|folder| ROOT_MARKERS.iter().any(|marker| folder.join(marker).is_file()))
            .map(Path::to_path_buf)
            .ok_or_else(|| TesseraError::Configuration {
                message: format!(
                    "could not find {} in {} or any parent folder",
                    ROOT_MARKERS.join(" or "),
                    start.display()
                ),
            })
    }

    fn find_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
        {
            let entry = entry.map_err(|error| TesseraError::WalkDir {
                path: root.to_path_buf(),
                message: error.to_string(),
            })?;

            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    fn delete_path(&self, path: &Path) -> Result<()> {
        if path.is_dir() {
            fs::remove_dir_all(path).io_context("deleting", path)?;
        } else if path.exists() {
            fs::remove_file(path).io_context("deleting", path)?;
        }
        Ok(())
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).io_context("creating folder", parent)?;
        }
        fs::write(path, content).io_context("writing", path)
    }

    fn mkpath(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).io_context("creating folder", path)
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        fs::copy(from, to).io_context("copying", from)?;
        Ok(())
    }

    fn creation_date(&self, path: &Path) -> Option<DateTime<Utc>> {
        fs::metadata(path)
            .and_then(|metadata| metadata.created())
            .ok()
            .map(DateTime::<Utc>::from)
    }

    fn modification_date(&self, path: &Path) -> Option<DateTime<Utc>> {
        fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }
}

#[derive(Debug, Clone)]
struct MemoryFile {
    path: PathBuf,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

/// An in-memory [`FileIo`] that records every write, copy and delete.
#[derive(Debug)]
pub struct MemoryIo {
    root: PathBuf,
    files: Vec<MemoryFile>,
    written: Mutex<BTreeMap<PathBuf, String>>,
    copied: Mutex<BTreeMap<PathBuf, PathBuf>>,
    deleted: Mutex<Vec<PathBuf>>,
}

impl MemoryIo {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            files: Vec::new(),
            written: Mutex::new(BTreeMap::new()),
            copied: Mutex::new(BTreeMap::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    /// Adds a source file, relative to the root, created and modified at `date`.
    pub fn file(mut self, relative: impl AsRef<Path>, date: DateTime<Utc>) -> Self {
        self.files.push(MemoryFile {
            path: self.root.join(relative),
            created: date,
            modified: date,
        });
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Written files keyed by absolute destination.
    pub fn written(&self) -> BTreeMap<PathBuf, String> {
        lock(&self.written).clone()
    }

    /// Written files keyed by destination relative to `base`.
    pub fn written_under(&self, base: &Path) -> BTreeMap<PathBuf, String> {
        lock(&self.written)
            .iter()
            .filter_map(|(path, content)| {
                path.strip_prefix(base)
                    .ok()
                    .map(|relative| (relative.to_path_buf(), content.clone()))
            })
            .collect()
    }

    /// Copied files as destination to source.
    pub fn copied(&self) -> BTreeMap<PathBuf, PathBuf> {
        lock(&self.copied).clone()
    }

    pub fn deleted(&self) -> Vec<PathBuf> {
        lock(&self.deleted).clone()
    }

    fn find(&self, path: &Path) -> Option<&MemoryFile> {
        self.files.iter().find(|file| file.path == path)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FileIo for MemoryIo {
    fn resolve_root(&self, _start: &Path) -> Result<PathBuf> {
        Ok(self.root.clone())
    }

    fn find_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|file| file.path.starts_with(root))
            .map(|file| file.path.clone())
            .collect();
        files.sort();
        Ok(files)
    }

    fn delete_path(&self, path: &Path) -> Result<()> {
        lock(&self.written).retain(|written, _| !written.starts_with(path));
        lock(&self.copied).retain(|copied, _| !copied.starts_with(path));
        lock(&self.deleted).push(path.to_path_buf());
        Ok(())
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        lock(&self.written).insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn mkpath(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        lock(&self.copied).insert(to.to_path_buf(), from.to_path_buf());
        Ok(())
    }

    fn creation_date(&self, path: &Path) -> Option<DateTime<Utc>> {
        self.find(path).map(|file| file.created)
    }

    fn modification_date(&self, path: &Path) -> Option<DateTime<Utc>> {
        self.find(path).map(|file| file.modified)
    }
}
