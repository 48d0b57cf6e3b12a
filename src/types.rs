//! Core types for ppconv

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

use crate::error::Error;

/// Direction of a conversion
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConversionMode {
    /// Bitmap to `.pp`
    Compress,
    /// `.pp` back to bitmap
    Decompress,
}

impl ConversionMode {
    /// First positional argument passed to the codec executable
    pub fn as_arg(&self) -> &'static str {
        match self {
            ConversionMode::Compress => "compress",
            ConversionMode::Decompress => "decompress",
        }
    }

    /// Extension of the file the codec writes in this mode
    pub fn output_extension(&self) -> &'static str {
        match self {
            ConversionMode::Compress => "pp",
            ConversionMode::Decompress => "bmp",
        }
    }
}

impl std::fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_arg())
    }
}

impl std::str::FromStr for ConversionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compress" => Ok(ConversionMode::Compress),
            "decompress" => Ok(ConversionMode::Decompress),
            _ => Err(Error::InvalidMode(s.to_string())),
        }
    }
}

/// Unique token identifying one job
///
/// The staged input and the reserved output of a job share this token, so
/// log lines and events for the same job can be correlated.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Get the inner token
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content of an upload, either already in memory or already on disk
#[derive(Clone, Debug)]
pub enum UploadSource {
    /// Raw uploaded bytes
    Bytes(Vec<u8>),
    /// A file written by the transport layer; it is copied, never moved
    Path(PathBuf),
}

/// One incoming conversion, owned by the pipeline for the duration of the job
#[derive(Clone, Debug)]
pub struct ConversionRequest {
    /// Uploaded content
    pub source: UploadSource,
    /// Name the client gave the file; used for logging only
    pub original_filename: String,
    /// Requested direction
    pub mode: ConversionMode,
}

/// Outcome of a successful job
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ConversionResult {
    /// Where the artifact lives until it is downloaded
    #[schema(value_type = String)]
    pub output_path: PathBuf,
    /// Generated artifact name, also the download token
    pub output_filename: String,
    /// Size of the staged input as measured on disk
    pub input_size_bytes: u64,
    /// Size of the codec output as measured on disk
    pub output_size_bytes: u64,
    /// `(1 - output/input) * 100` rounded to 2 decimals; compress mode only
    pub compression_ratio_percent: Option<f64>,
}

impl ConversionResult {
    /// Ratio as the client sees it, e.g. `"75.00%"`
    pub fn ratio_display(&self) -> Option<String> {
        self.compression_ratio_percent
            .map(|ratio| format!("{:.2}%", ratio))
    }
}

/// Space saved by a conversion, in percent rounded to two decimals
///
/// Returns `None` for decompression and for an empty input.
pub fn compression_ratio(
    input_size: u64,
    output_size: u64,
    mode: ConversionMode,
) -> Option<f64> {
    if mode != ConversionMode::Compress || input_size == 0 {
        return None;
    }
    let ratio = (1.0 - output_size as f64 / input_size as f64) * 100.0;
    Some((ratio * 100.0).round() / 100.0)
}

/// Events emitted by the service
///
/// Consumers subscribe via [`ConversionService::subscribe`](crate::ConversionService::subscribe).
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A job was accepted and its input staged
    JobStarted {
        /// Job token
        job_id: JobId,
        /// Requested direction
        mode: ConversionMode,
        /// Name the client gave the upload
        original_filename: String,
    },

    /// A job finished and its artifact is downloadable
    JobCompleted {
        /// Job token
        job_id: JobId,
        /// Download token
        output_filename: String,
        /// Input size in bytes
        input_size_bytes: u64,
        /// Output size in bytes
        output_size_bytes: u64,
    },

    /// A job failed; all its files have been removed
    JobFailed {
        /// Job token (absent if the job failed before a token was assigned)
        #[serde(skip_serializing_if = "Option::is_none")]
        job_id: Option<JobId>,
        /// Machine-readable error code
        code: String,
        /// Error message
        error: String,
    },

    /// A client started downloading an artifact
    ArtifactServed {
        /// Download token
        filename: String,
    },

    /// An artifact was deleted and its token is no longer valid
    ArtifactExpired {
        /// Download token
        filename: String,
    },

    /// The service finished shutting down
    Shutdown,
}
