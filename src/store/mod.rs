//! Transient artifact storage
//!
//! [`ArtifactStore`] wraps the two directories a job touches:
//!
//! - the **upload** directory, where uploads are staged before the codec reads them
//! - the **output** directory, where the codec writes its result
//!
//! Entries are never renamed or overwritten. Every name is derived from a
//! unique job token and claimed with `create_new`, so concurrent jobs never
//! need a lock to stay out of each other's way.

use crate::error::{Error, Result};
use crate::types::{ConversionMode, UploadSource};
use crate::utils::{output_filename, staged_filename};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Number of suffixed names tried when a generated name is already taken
const MAX_CLAIM_ATTEMPTS: u32 = 16;

/// Output path claimed for one job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservedOutput {
    /// Generated file name, also the download token
    pub filename: String,
    /// Full path inside the output directory
    pub path: PathBuf,
}

/// Filesystem wrapper around the upload and output directories
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl ArtifactStore {
    /// Create a store over the given directories
    ///
    /// No I/O happens here; directories are created by [`ensure_dirs`](Self::ensure_dirs)
    /// or lazily on first use.
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Inbound staging directory
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Outbound result directory
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create both directories if absent
    ///
    /// Safe to call any number of times, including concurrently.
    pub async fn ensure_dirs(&self) -> Result<()> {
        ensure_dir(&self.upload_dir).await?;
        ensure_dir(&self.output_dir).await
    }

    /// Delete every regular file in both directories
    ///
    /// Used at startup to drop leftovers of a previous process. Returns the
    /// number of files removed.
    pub async fn purge(&self) -> Result<usize> {
        let mut removed = 0;
        for dir in [&self.upload_dir, &self.output_dir] {
            let mut entries = match fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_file() {
                    self.remove(&entry.path()).await?;
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            debug!(removed, "purged stale files from transient storage");
        }
        Ok(removed)
    }

    /// Write an upload into the upload directory under a fresh name
    ///
    /// A half-written file is removed before the error is returned.
    pub async fn stage(&self, token: &str, source: &UploadSource) -> Result<PathBuf> {
        ensure_dir(&self.upload_dir).await.map_err(|e| Error::Staging {
            path: self.upload_dir.clone(),
            reason: e.to_string(),
        })?;

        let (path, mut file) = claim(&self.upload_dir, &staged_filename(token))
            .await
            .map_err(|e| Error::Staging {
                path: self.upload_dir.join(staged_filename(token)),
                reason: e.to_string(),
            })?;

        if let Err(e) = write_source(&mut file, source).await {
            drop(file);
            if let Err(cleanup) = self.remove(&path).await {
                warn!(path = ?path, error = %cleanup, "failed to remove partially staged upload");
            }
            return Err(Error::Staging {
                path,
                reason: e.to_string(),
            });
        }

        debug!(path = ?path, "upload staged");
        Ok(path)
    }

    /// Claim an output path for a job, with the extension the mode produces
    ///
    /// The file is created empty so no other job can take the same name; the
    /// codec overwrites it.
    pub async fn reserve_output(&self, token: &str, mode: ConversionMode) -> Result<ReservedOutput> {
        let wanted = output_filename(token, mode.output_extension());

        ensure_dir(&self.output_dir).await.map_err(|e| Error::Staging {
            path: self.output_dir.clone(),
            reason: e.to_string(),
        })?;

        let (path, _file) = claim(&self.output_dir, &wanted)
            .await
            .map_err(|e| Error::Staging {
                path: self.output_dir.join(&wanted),
                reason: format!("failed to reserve output path: {}", e),
            })?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(wanted);

        Ok(ReservedOutput { filename, path })
    }

    /// Whether a file exists at `path`
    pub async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    /// Size of the file at `path` in bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if nothing exists at `path`.
    pub async fn size_of(&self, path: &Path) -> Result<u64> {
        match fs::metadata(path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the file at `path`; deleting a missing file is not an error
    pub async fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = ?path, "removed file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Blocking variant of [`ArtifactStore::remove`] for use from `Drop`
pub(crate) fn remove_blocking(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

async fn ensure_dir(dir: &Path) -> Result<()> {
    // create_dir_all tolerates the directory appearing concurrently
    fs::create_dir_all(dir).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to create directory '{}': {}", dir.display(), e),
        ))
    })
}

/// Create `dir/name` exclusively, falling back to `name-1`, `name-2`, ...
async fn claim(dir: &Path, name: &str) -> std::io::Result<(PathBuf, File)> {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (name, None),
    };

    for attempt in 0..MAX_CLAIM_ATTEMPTS {
        let candidate = match (attempt, ext) {
            (0, _) => name.to_string(),
            (n, Some(ext)) => format!("{}-{}.{}", stem, n, ext),
            (n, None) => format!("{}-{}", stem, n),
        };
        let path = dir.join(candidate);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(path = ?path, "generated name already taken, trying another");
            }
            Err(e) => return Err(e),
        }
    }

    Err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free name for {} after {} attempts", name, MAX_CLAIM_ATTEMPTS),
    ))
}

async fn write_source(file: &mut File, source: &UploadSource) -> std::io::Result<()> {
    match source {
        UploadSource::Bytes(bytes) => file.write_all(bytes).await?,
        UploadSource::Path(src) => {
            let mut reader = File::open(src).await?;
            tokio::io::copy(&mut reader, file).await?;
        }
    }
    file.flush().await
}
