//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`conversions`] - Upload-and-convert, one-shot download
//! - [`system`] - Health, events, OpenAPI

use crate::types::ConversionResult;
use serde::{Deserialize, Serialize};

mod conversions;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use conversions::*;
pub use system::*;

// ============================================================================
// Response Types (shared across handlers)
// ============================================================================

/// Response for POST /process
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    /// Always true; failures use the error body instead
    pub success: bool,
    /// Human-readable summary
    pub message: String,
    /// Relative URL the artifact can be downloaded from (once)
    pub download_url: String,
    /// Size statistics
    pub stats: ProcessStats,
}

/// Size statistics of a finished conversion
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStats {
    /// Staged input size in bytes
    pub original_size: u64,
    /// Output size in bytes
    pub processed_size: u64,
    /// Space saved, formatted like `"75.00%"`; null for decompression
    pub compression_ratio: Option<String>,
}

impl From<&ConversionResult> for ProcessResponse {
    fn from(result: &ConversionResult) -> Self {
        Self {
            success: true,
            message: "File processed successfully".to_string(),
            download_url: format!("/api/download/{}", result.output_filename),
            stats: ProcessStats {
                original_size: result.input_size_bytes,
                processed_size: result.output_size_bytes,
                compression_ratio: result.ratio_display(),
            },
        }
    }
}
