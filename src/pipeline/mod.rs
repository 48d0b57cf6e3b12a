//! Conversion job pipeline
//!
//! One call to [`ConversionPipeline::process`] runs one job, strictly in order:
//!
//! 1. stage the upload into the upload directory
//! 2. reserve a uniquely named output path (`.pp` for compress, `.bmp` for decompress)
//! 3. run the codec
//! 4. verify the codec exited cleanly and left a non-empty output file
//! 5. measure input and output sizes on disk and derive the ratio
//! 6. remove the staged input (on every path, success or failure)
//! 7. register the output with the download gate
//!
//! The staged input and the reserved output are each owned by a cleanup guard
//! from the moment they exist. A failure, panic or cancellation at any step
//! drops the guards and removes both files; only a successful job hands its
//! output over to the gate.

mod guard;


use crate::codec::{Codec, CodecOutcome};
use crate::error::{Error, Result, ToHttpStatus};
use crate::gate::DownloadGate;
use crate::store::ArtifactStore;
use crate::types::{
    ConversionMode, ConversionRequest, ConversionResult, Event, JobId, compression_ratio,
};
use crate::utils::unique_token;
use guard::CleanupGuard;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Runs conversion jobs (cloneable - all fields are shared handles)
#[derive(Clone)]
pub struct ConversionPipeline {
    store: ArtifactStore,
    codec: Arc<dyn Codec>,
    gate: DownloadGate,
    event_tx: broadcast::Sender<Event>,
}

impl ConversionPipeline {
    /// Assemble a pipeline from its collaborators
    pub fn new(
        store: ArtifactStore,
        codec: Arc<dyn Codec>,
        gate: DownloadGate,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            store,
            codec,
            gate,
            event_tx,
        }
    }

    /// Name of the codec in use
    pub fn codec_name(&self) -> &'static str {
        self.codec.name()
    }

    /// Run one job to completion
    ///
    /// On success the output is registered with the download gate under
    /// `ConversionResult::output_filename`. On failure no file created by the
    /// job is left behind.
    ///
    /// # Errors
    ///
    /// - [`Error::Staging`] if the upload cannot be written or no output path can be reserved
    /// - [`Error::CodecLaunch`] if the codec cannot be started
    /// - [`Error::ConversionTimeout`] if the codec exceeds its time bound
    /// - [`Error::ConversionFailed`] if the codec fails or leaves no usable output
    pub async fn process(&self, request: ConversionRequest) -> Result<ConversionResult> {
        let job_id = JobId(unique_token());

        let result = self.run(&job_id, request).await;

        if let Err(e) = &result {
            warn!(job_id = %job_id, error = %e, "conversion job failed");
            self.event_tx
                .send(Event::JobFailed {
                    job_id: Some(job_id.clone()),
                    code: e.error_code().to_string(),
                    error: e.to_string(),
                })
                .ok();
        }
        result
    }

    async fn run(&self, job_id: &JobId, request: ConversionRequest) -> Result<ConversionResult> {
        let mode = request.mode;

        let input = CleanupGuard::new(
            self.store.stage(job_id.as_str(), &request.source).await?,
            "staged input",
        );
        let input_size = self.store.size_of(input.path()).await?;

        info!(
            job_id = %job_id,
            %mode,
            original_filename = %request.original_filename,
            input_size,
            "conversion job started"
        );
        self.event_tx
            .send(Event::JobStarted {
                job_id: job_id.clone(),
                mode,
                original_filename: request.original_filename.clone(),
            })
            .ok();

        let reserved = self.store.reserve_output(job_id.as_str(), mode).await?;
        let output = CleanupGuard::new(reserved.path.clone(), "job output");

        let converted = self.convert(job_id, mode, input.path(), output.path()).await;

        input.release(&self.store).await;
        // on error `output` is dropped here and takes the partial file with it
        let output_size = converted?;

        let output_path = output.keep();
        let result = ConversionResult {
            output_path: output_path.clone(),
            output_filename: reserved.filename.clone(),
            input_size_bytes: input_size,
            output_size_bytes: output_size,
            compression_ratio_percent: compression_ratio(input_size, output_size, mode),
        };

        self.gate.register(&reserved.filename, output_path);

        info!(
            job_id = %job_id,
            output_filename = %result.output_filename,
            input_size,
            output_size,
            ratio = ?result.compression_ratio_percent,
            "conversion job completed"
        );
        self.event_tx
            .send(Event::JobCompleted {
                job_id: job_id.clone(),
                output_filename: result.output_filename.clone(),
                input_size_bytes: input_size,
                output_size_bytes: output_size,
            })
            .ok();

        Ok(result)
    }

    /// Run the codec and verify what it left behind; returns the output size
    async fn convert(
        &self,
        job_id: &JobId,
        mode: ConversionMode,
        input: &Path,
        output: &Path,
    ) -> Result<u64> {
        debug!(job_id = %job_id, codec = self.codec.name(), ?input, ?output, "invoking codec");
        let outcome = self.codec.invoke(mode, input, output).await?;

        if !outcome.stderr_text.trim().is_empty() {
            warn!(job_id = %job_id, stderr = %outcome.stderr_text.trim(), "codec wrote to stderr");
        }

        if !outcome.exit_succeeded {
            let reason = match outcome.exit_code {
                Some(code) => format!("codec exited with status {}", code),
                None => "codec was terminated by a signal".to_string(),
            };
            return Err(failed(reason, outcome));
        }

        let output_size = match self.store.size_of(output).await {
            Ok(size) => size,
            Err(Error::NotFound(_)) => {
                return Err(failed("codec produced no output file", outcome));
            }
            Err(e) => return Err(e),
        };
        if output_size == 0 {
            return Err(failed("codec produced an empty output file", outcome));
        }

        Ok(output_size)
    }
}

fn failed(reason: impl Into<String>, outcome: CodecOutcome) -> Error {
    Error::ConversionFailed {
        reason: reason.into(),
        stderr: outcome.stderr_text,
        stdout: outcome.stdout_text,
    }
}
