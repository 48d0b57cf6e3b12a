//! One-shot download gate
//!
//! Finished jobs register their artifact here under its generated file name,
//! which doubles as the download token. A fetch hands out an open file plus a
//! read lease. When the last lease on an artifact is dropped (the body was
//! fully sent, or the client went away) the artifact is deleted after a short
//! grace period. A retry inside the grace period is served and pushes deletion
//! back. After deletion the token answers `NotFound`.
//!
//! Deletion is tied to the end of the transfer rather than to a timer started
//! when the download begins, so a slow client is never cut off mid-file.
//! Artifacts nobody fetches are deleted after `unclaimed_ttl`.
//!
//! Every scheduled expiry carries the entry's generation at scheduling time;
//! any fetch or release bumps the generation, so stale timers do nothing. Only
//! the caller that removes an entry from the registry deletes its file, which
//! keeps deletion to at most once.

use crate::error::{Error, Result};
use crate::store::{ArtifactStore, remove_blocking};
use crate::types::Event;
use crate::utils::is_plain_filename;
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::broadcast;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Registry entry for one downloadable artifact
#[derive(Debug)]
struct ArtifactEntry {
    path: PathBuf,
    active_readers: usize,
    generation: u64,
}

struct GateInner {
    entries: Mutex<HashMap<String, ArtifactEntry>>,
    store: ArtifactStore,
    expiry_grace: Duration,
    unclaimed_ttl: Option<Duration>,
    event_tx: broadcast::Sender<Event>,
}

/// Registry of artifacts that may be downloaded (cloneable, shared state is Arc-wrapped)
#[derive(Clone)]
pub struct DownloadGate {
    inner: Arc<GateInner>,
}

impl DownloadGate {
    /// Create an empty gate
    ///
    /// * `expiry_grace` - delay between the end of a download and deletion
    /// * `unclaimed_ttl` - lifetime of an artifact that is never fetched (None = until shutdown)
    pub fn new(
        store: ArtifactStore,
        expiry_grace: Duration,
        unclaimed_ttl: Option<Duration>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            inner: Arc::new(GateInner {
                entries: Mutex::new(HashMap::new()),
                store,
                expiry_grace,
                unclaimed_ttl,
                event_tx,
            }),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, ArtifactEntry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `path` downloadable under `filename`
    pub fn register(&self, filename: impl Into<String>, path: impl Into<PathBuf>) {
        let filename = filename.into();
        let path = path.into();

        let replaced = self.entries().insert(
            filename.clone(),
            ArtifactEntry {
                path: path.clone(),
                active_readers: 0,
                generation: 0,
            },
        );
        if let Some(old) = replaced
            && old.path != path
        {
            warn!(filename = %filename, old = ?old.path, "artifact name re-registered, dropping old file");
            if let Err(e) = remove_blocking(&old.path) {
                warn!(path = ?old.path, error = %e, "failed to remove replaced artifact");
            }
        }

        debug!(filename = %filename, path = ?path, "artifact registered");

        if let Some(ttl) = self.inner.unclaimed_ttl {
            self.schedule_expiry(filename, 0, ttl);
        }
    }

    /// Whether `filename` is currently downloadable
    pub fn contains(&self, filename: &str) -> bool {
        self.entries().contains_key(filename)
    }

    /// Number of registered artifacts
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether no artifacts are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a registered artifact for download
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the name was never registered, has
    /// already been served and expired, or its file has disappeared.
    pub async fn fetch(&self, filename: &str) -> Result<ArtifactDownload> {
        if !is_plain_filename(filename) {
            return Err(Error::NotFound(filename.to_string()));
        }

        let path = {
            let mut entries = self.entries();
            let entry = entries
                .get_mut(filename)
                .ok_or_else(|| Error::NotFound(filename.to_string()))?;
            entry.active_readers += 1;
            entry.generation += 1;
            entry.path.clone()
        };
        let mut lease = ReadLease {
            gate: self.clone(),
            filename: filename.to_string(),
            served: false,
        };

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(filename = %filename, path = ?path, "registered artifact missing on disk");
                self.entries().remove(filename);
                return Err(Error::NotFound(filename.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata().await?.len();

        lease.served = true;
        self.inner
            .event_tx
            .send(Event::ArtifactServed {
                filename: filename.to_string(),
            })
            .ok();

        Ok(ArtifactDownload {
            filename: filename.to_string(),
            len,
            file,
            lease,
        })
    }

    /// Delete every registered artifact, in use or not
    ///
    /// Returns the number of artifacts removed.
    pub async fn expire_all(&self) -> usize {
        let drained: Vec<(String, ArtifactEntry)> = self.entries().drain().collect();
        let count = drained.len();
        for (filename, entry) in drained {
            self.delete(&filename, &entry.path).await;
        }
        count
    }

    /// Drop one read claim; an unserved claim falls back to the unclaimed ttl
    fn release(&self, filename: &str, served: bool) {
        let delay = if served {
            Some(self.inner.expiry_grace)
        } else {
            self.inner.unclaimed_ttl
        };
        let generation = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(filename) else {
                return;
            };
            entry.active_readers = entry.active_readers.saturating_sub(1);
            if entry.active_readers > 0 {
                return;
            }
            entry.generation += 1;
            entry.generation
        };
        if let Some(delay) = delay {
            self.schedule_expiry(filename.to_string(), generation, delay);
        }
    }

    fn schedule_expiry(&self, filename: String, generation: u64, delay: Duration) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let gate = self.clone();
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(path) = gate.take_if_current(&filename, generation) {
                        gate.delete(&filename, &path).await;
                    }
                });
            }
            // no runtime to wait on (e.g. dropped during teardown): delete now
            Err(_) => {
                if let Some(path) = self.take_if_current(&filename, generation) {
                    if let Err(e) = remove_blocking(&path) {
                        warn!(path = ?path, error = %e, "failed to delete expired artifact");
                    }
                }
            }
        }
    }

    fn take_if_current(&self, filename: &str, generation: u64) -> Option<PathBuf> {
        let mut entries = self.entries();
        match entries.get(filename) {
            Some(entry) if entry.generation == generation && entry.active_readers == 0 => {
                entries.remove(filename).map(|entry| entry.path)
            }
            _ => None,
        }
    }

    async fn delete(&self, filename: &str, path: &std::path::Path) {
        if let Err(e) = self.inner.store.remove(path).await {
            warn!(filename = %filename, path = ?path, error = %e, "failed to delete expired artifact");
        }
        debug!(filename = %filename, "artifact expired");
        self.inner
            .event_tx
            .send(Event::ArtifactExpired {
                filename: filename.to_string(),
            })
            .ok();
    }
}

/// Held by an open download; dropping it starts the expiry countdown
///
/// A lease dropped before the artifact was handed out leaves it claimable.
struct ReadLease {
    gate: DownloadGate,
    filename: String,
    served: bool,
}

impl Drop for ReadLease {
    fn drop(&mut self) {
        self.gate.release(&self.filename, self.served);
    }
}

/// An artifact opened for download
pub struct ArtifactDownload {
    /// Download token / file name
    pub filename: String,
    /// Size in bytes
    pub len: u64,
    file: File,
    lease: ReadLease,
}

impl std::fmt::Debug for ArtifactDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactDownload")
            .field("filename", &self.filename)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl ArtifactDownload {
    /// Stream the file in chunks; the lease is released when the stream is dropped
    pub fn into_stream(
        self,
    ) -> impl Stream<Item = <ReaderStream<File> as Stream>::Item> + Send + 'static {
        let lease = self.lease;
        ReaderStream::new(self.file).map(move |chunk| {
            let _held = &lease;
            chunk
        })
    }

    /// Read the whole artifact into memory, then release the lease
    pub async fn read_to_end(mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(usize::try_from(self.len).unwrap_or(0));
        self.file.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}
