//! Error types for ppconv
//!
//! This module provides error handling for the conversion service, including:
//! - The job failure taxonomy (invalid mode, staging, codec launch, timeout, failed conversion)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes
//! - Captured codec diagnostics attached to failed conversions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for ppconv operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ppconv
///
/// Every failure surfaced by the pipeline, the download gate and the API is one of
/// these variants. Variants carry enough context for a client-facing error body.
#[derive(Debug, Error)]
pub enum Error {
    /// Requested mode is neither `compress` nor `decompress`
    #[error("invalid mode '{0}': expected 'compress' or 'decompress'")]
    InvalidMode(String),

    /// Upload could not be written to (or an output path reserved in) the transient store
    #[error("staging failed for {path}: {reason}")]
    Staging {
        /// Path that could not be written or reserved
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// Codec executable is missing or cannot be executed
    #[error("failed to launch codec {executable}: {reason}")]
    CodecLaunch {
        /// Executable that was attempted
        executable: PathBuf,
        /// Underlying cause (not found, permission denied, ...)
        reason: String,
    },

    /// Codec did not finish within the configured bound and was terminated
    #[error("codec did not finish within {timeout:?} and was terminated")]
    ConversionTimeout {
        /// The bound that was exceeded
        timeout: Duration,
    },

    /// Codec exited abnormally or produced no usable output
    #[error("conversion failed: {reason}")]
    ConversionFailed {
        /// What went wrong (non-zero exit, missing output, empty output)
        reason: String,
        /// Everything the codec wrote to stderr
        stderr: String,
        /// Everything the codec wrote to stdout
        stdout: String,
    },

    /// Artifact unknown, already served and expired, or missing on disk
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "codec.timeout")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new conversions")]
    ShuttingDown,

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

impl Error {
    /// Build a `ConversionFailed` without captured output
    pub(crate) fn conversion_failed(reason: impl Into<String>) -> Self {
        Error::ConversionFailed {
            reason: reason.into(),
            stderr: String::new(),
            stdout: String::new(),
        }
    }
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "conversion_failed",
///     "message": "conversion failed: codec produced no output file",
///     "details": {
///       "stderr": "Failed to open output file"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "invalid_mode")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - client sent something we cannot work with
            Error::InvalidMode(_) => 400,
            Error::Config { .. } => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 422 Unprocessable Entity - the codec rejected the input
            Error::ConversionFailed { .. } => 422,

            // 500 Internal Server Error
            Error::Staging { .. } => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,

            // 503 Service Unavailable
            Error::CodecLaunch { .. } => 503,
            Error::ShuttingDown => 503,

            // 504 Gateway Timeout - the external codec hung
            Error::ConversionTimeout { .. } => 504,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::InvalidMode(_) => "invalid_mode",
            Error::Staging { .. } => "staging_error",
            Error::CodecLaunch { .. } => "codec_launch_error",
            Error::ConversionTimeout { .. } => "conversion_timeout",
            Error::ConversionFailed { .. } => "conversion_failed",
            Error::NotFound(_) => "not_found",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ShuttingDown => "shutting_down",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::ConversionFailed { stderr, stdout, .. }
                if !stderr.is_empty() || !stdout.is_empty() =>
            {
                Some(serde_json::json!({
                    "stderr": stderr,
                    "stdout": stdout,
                }))
            }
            Error::ConversionTimeout { timeout } => Some(serde_json::json!({
                "timeout_secs": timeout.as_secs_f64(),
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(Error, u16, &'static str)> {
        vec![
            (Error::InvalidMode("zip".into()), 400, "invalid_mode"),
            (
                Error::Staging {
                    path: PathBuf::from("uploads/x"),
                    reason: "disk full".into(),
                },
                500,
                "staging_error",
            ),
            (
                Error::CodecLaunch {
                    executable: PathBuf::from("/nope/compress"),
                    reason: "not found".into(),
                },
                503,
                "codec_launch_error",
            ),
            (
                Error::ConversionTimeout {
                    timeout: Duration::from_secs(60),
                },
                504,
                "conversion_timeout",
            ),
            (
                Error::conversion_failed("no output"),
                422,
                "conversion_failed",
            ),
            (Error::NotFound("processed_1.pp".into()), 404, "not_found"),
            (
                Error::Config {
                    message: "bad".into(),
                    key: None,
                },
                400,
                "config_error",
            ),
            (
                Error::Io(std::io::Error::other("boom")),
                500,
                "io_error",
            ),
            (Error::ShuttingDown, 503, "shutting_down"),
            (
                Error::ApiServerError("bind".into()),
                500,
                "api_server_error",
            ),
        ]
    }

    #[test]
    fn every_variant_maps_to_status_and_code() {
        for (error, status, code) in all_error_variants() {
            assert_eq!(error.status_code(), status, "status for {error:?}");
            assert_eq!(error.error_code(), code, "code for {error:?}");
        }
    }

    #[test]
    fn conversion_failed_details_carry_captured_output() {
        let error = Error::ConversionFailed {
            reason: "codec produced no output file".into(),
            stderr: "Failed to open output file\n".into(),
            stdout: "".into(),
        };

        let api: ApiError = error.into();
        assert_eq!(api.error.code, "conversion_failed");
        let details = api.error.details.expect("details should be present");
        assert_eq!(details["stderr"], "Failed to open output file\n");
        assert_eq!(details["stdout"], "");
    }

    #[test]
    fn conversion_failed_without_output_has_no_details() {
        let api: ApiError = Error::conversion_failed("empty output").into();
        assert!(api.error.details.is_none());
        assert!(api.error.message.contains("empty output"));
    }

    #[test]
    fn timeout_details_report_bound() {
        let api: ApiError = Error::ConversionTimeout {
            timeout: Duration::from_millis(1500),
        }
        .into();
        assert_eq!(api.error.details.unwrap()["timeout_secs"], 1.5);
    }

    #[test]
    fn api_error_serializes_without_null_details() {
        let json = serde_json::to_value(ApiError::new("missing_file", "No file uploaded")).unwrap();
        assert_eq!(json["error"]["code"], "missing_file");
        assert!(json["error"].get("details").is_none());
    }
}
