//! In-process codec that copies its input unchanged

use super::traits::{Codec, CodecOutcome};
use crate::types::ConversionMode;
use async_trait::async_trait;
use std::path::Path;

/// Codec that writes the input bytes to the output path unchanged
///
/// Compressing and then decompressing through it yields the original bytes,
/// which makes it useful for exercising the job pipeline without the real
/// codec, and as a pass-through when no codec is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyCodec;

impl CopyCodec {
    /// Create a new copy codec
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Codec for CopyCodec {
    async fn invoke(
        &self,
        mode: ConversionMode,
        input: &Path,
        output: &Path,
    ) -> crate::Result<CodecOutcome> {
        match tokio::fs::copy(input, output).await {
            Ok(bytes) => {
                tracing::debug!(%mode, bytes, "copy codec finished");
                Ok(CodecOutcome::success())
            }
            // mirror an external program that reports and exits non-zero
            Err(e) => Ok(CodecOutcome {
                exit_succeeded: false,
                exit_code: Some(1),
                stderr_text: format!("copy failed: {}", e),
                stdout_text: String::new(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "copy"
    }
}
