//! Traits and types for codec invocation

use crate::types::ConversionMode;
use async_trait::async_trait;
use std::path::Path;

/// What a codec run reported
///
/// This does not by itself mean the conversion worked: the pipeline also checks
/// that the promised output file exists and is non-empty.
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecOutcome {
    /// Whether the process exited with status 0
    pub exit_succeeded: bool,
    /// Exit code, if the process exited normally
    pub exit_code: Option<i32>,
    /// Everything written to stderr
    pub stderr_text: String,
    /// Everything written to stdout
    pub stdout_text: String,
}

impl CodecOutcome {
    /// Outcome of a run that exited cleanly with no diagnostics
    pub fn success() -> Self {
        Self {
            exit_succeeded: true,
            exit_code: Some(0),
            ..Default::default()
        }
    }
}

/// Trait for something that converts a file at one path into a file at another
///
/// Implementations can run an external binary, convert in process, or stand in
/// for the real codec in tests.
#[async_trait]
pub trait Codec: Send + Sync {
    /// Convert `input` into `output` in the given direction
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The executable cannot be started ([`Error::CodecLaunch`](crate::Error::CodecLaunch))
    /// - The run exceeds its time bound ([`Error::ConversionTimeout`](crate::Error::ConversionTimeout))
    ///
    /// A run that starts and exits, successfully or not, is reported through
    /// [`CodecOutcome`] rather than as an error.
    async fn invoke(
        &self,
        mode: ConversionMode,
        input: &Path,
        output: &Path,
    ) -> crate::Result<CodecOutcome>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
