use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// How a snapshot proves the file has not moved underneath us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (cheaper for large files)
    Hash(u64),
}

impl ContentVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            ContentVerification::ExactMatch(expected) => text == expected,
            ContentVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            ContentVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            ContentVerification::ExactMatch(text.to_string())
        }
    }
}

/// File contents as read, plus what is needed to write them back safely.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub path: PathBuf,
    pub contents: String,
    pub verification: ContentVerification,
}

impl Snapshot {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let contents = contents.into();
        Self {
            path: path.into(),
            verification: ContentVerification::from_text(&contents),
            contents,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} changed on disk since it was read; refusing to overwrite")]
    ModifiedSinceRead(PathBuf),
}

/// Outcome of writing a snapshot back.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "WriteResult should be checked for whether anything was written"]
pub enum WriteResult {
    Written { file: PathBuf, bytes_written: usize },
    /// New contents equal the snapshot; nothing was written.
    Unchanged { file: PathBuf },
    /// A dry-run store would have written this file.
    DryRun { file: PathBuf },
}

/// Storage collaborator for native source files.
///
/// Implementations must keep every byte outside the patched region intact;
/// the patcher hands over complete file contents.
pub trait SourceStore {
    fn read(&self, path: &Path) -> Result<Snapshot, StoreError>;

    fn write(&self, snapshot: &Snapshot, contents: &str) -> Result<WriteResult, StoreError>;
}

/// Filesystem store with verified, atomic writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

impl SourceStore for FsStore {
    fn read(&self, path: &Path) -> Result<Snapshot, StoreError> {
        let contents = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Snapshot::new(path, contents))
    }

    fn write(&self, snapshot: &Snapshot, contents: &str) -> Result<WriteResult, StoreError> {
        let path = &snapshot.path;
        if snapshot.contents == contents {
            return Ok(WriteResult::Unchanged { file: path.clone() });
        }

        let current = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        if !snapshot.verification.matches(&current) {
            return Err(StoreError::ModifiedSinceRead(path.clone()));
        }

        let write_err = |source| StoreError::Write {
            path: path.clone(),
            source,
        };
        atomic_write(path, contents.as_bytes()).map_err(write_err)?;

        // Xcode and Gradle key incremental builds off mtime.
        filetime::set_file_mtime(path, filetime::FileTime::now()).map_err(write_err)?;

        Ok(WriteResult::Written {
            file: path.clone(),
            bytes_written: contents.len(),
        })
    }
}

/// Reads through to an inner store and never writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunStore<S = FsStore> {
    inner: S,
}

impl<S: SourceStore> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: SourceStore> SourceStore for DryRunStore<S> {
    fn read(&self, path: &Path) -> Result<Snapshot, StoreError> {
        self.inner.read(path)
    }

    fn write(&self, snapshot: &Snapshot, contents: &str) -> Result<WriteResult, StoreError> {
        if snapshot.contents == contents {
            return Ok(WriteResult::Unchanged {
                file: snapshot.path.clone(),
            });
        }
        Ok(WriteResult::DryRun {
            file: snapshot.path.clone(),
        })
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write lands or the original file is left untouched.
fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    // Same directory keeps the rename on one filesystem.
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        )
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    // Keep the original permissions; NamedTempFile creates 0600.
    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp.path(), metadata.permissions())?;
    }

    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
