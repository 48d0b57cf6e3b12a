//! Scoped cleanup of job files

use crate::store::{ArtifactStore, remove_blocking};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Owns a job file and deletes it when dropped unless it was kept
///
/// Drop runs on every exit path: early `?` returns, panics while unwinding, and
/// cancellation when the job future is dropped.
#[derive(Debug)]
pub(crate) struct CleanupGuard {
    path: PathBuf,
    label: &'static str,
    armed: bool,
}

impl CleanupGuard {
    pub(crate) fn new(path: PathBuf, label: &'static str) -> Self {
        Self {
            path,
            label,
            armed: true,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now; on failure the drop handler tries once more
    pub(crate) async fn release(mut self, store: &ArtifactStore) {
        match store.remove(&self.path).await {
            Ok(()) => self.armed = false,
            Err(e) => {
                warn!(file = self.label, path = ?self.path, error = %e, "failed to remove job file");
            }
        }
    }

    /// Hand the file over to a new owner; it will no longer be deleted here
    pub(crate) fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match remove_blocking(&self.path) {
            Ok(()) => debug!(file = self.label, path = ?self.path, "removed job file"),
            Err(e) => {
                warn!(file = self.label, path = ?self.path, error = %e, "failed to remove job file")
            }
        }
    }
}
