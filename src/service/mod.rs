//! Conversion service facade
//!
//! [`ConversionService`] is what an embedding application holds. It owns the
//! transient directories, the download gate and the job pipeline, and exposes
//! the two boundary operations:
//!
//! - [`submit`](ConversionService::submit) - upload bytes, get a download token and stats
//! - [`retrieve`](ConversionService::retrieve) - exchange a token for the artifact, once
//!
//! Startup and shutdown live in [`lifecycle`].

mod lifecycle;


use crate::codec::{CliCodec, Codec};
use crate::config::{CodecConfig, Config};
use crate::error::{Error, Result, ToHttpStatus};
use crate::gate::{ArtifactDownload, DownloadGate};
use crate::pipeline::ConversionPipeline;
use crate::store::ArtifactStore;
use crate::types::{ConversionMode, ConversionRequest, ConversionResult, Event, UploadSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Semaphore, broadcast};

/// Main service instance (cloneable - all fields are Arc-wrapped or shared handles)
#[derive(Clone)]
pub struct ConversionService {
    /// Configuration the service was started with
    pub(crate) config: Arc<Config>,
    /// Transient directories
    pub(crate) store: ArtifactStore,
    /// Registry of downloadable artifacts
    pub(crate) gate: DownloadGate,
    /// Job runner
    pub(crate) pipeline: ConversionPipeline,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// One permit per concurrently running job (respects codec.max_concurrent_jobs)
    pub(crate) job_slots: Arc<Semaphore>,
    /// Set to false once shutdown begins
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl ConversionService {
    /// Create a service around an explicit codec
    ///
    /// This is the single initialisation point for the shared directories:
    /// - Validates the configuration
    /// - Creates the upload and output directories if absent
    /// - Purges leftovers of a previous process (if `storage.purge_on_start`)
    /// - Sets up the event channel, download gate and pipeline
    pub async fn new(config: Config, codec: Arc<dyn Codec>) -> Result<Self> {
        config.validate()?;

        let store = ArtifactStore::new(&config.storage.upload_dir, &config.storage.output_dir);
        store.ensure_dirs().await?;
        if config.storage.purge_on_start {
            let removed = store.purge().await?;
            if removed > 0 {
                tracing::info!(removed, "removed files left by a previous run");
            }
        }

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = broadcast::channel(1000);

        let gate = DownloadGate::new(
            store.clone(),
            config.download.expiry_grace,
            config.download.unclaimed_ttl,
            event_tx.clone(),
        );
        let pipeline =
            ConversionPipeline::new(store.clone(), codec, gate.clone(), event_tx.clone());

        tracing::info!(
            codec = pipeline.codec_name(),
            upload_dir = ?store.upload_dir(),
            output_dir = ?store.output_dir(),
            "conversion service ready"
        );

        Ok(Self {
            job_slots: Arc::new(Semaphore::new(config.codec.max_concurrent_jobs)),
            config: Arc::new(config),
            store,
            gate,
            pipeline,
            event_tx,
            accepting_new: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Create a service that runs the external codec executable
    ///
    /// The executable comes from `codec.executable_path`, or is searched for in
    /// PATH under `codec.binary_name`.
    pub async fn with_default_codec(config: Config) -> Result<Self> {
        let codec = resolve_codec(&config.codec)?;
        Self::new(config, Arc::new(codec)).await
    }

    /// Convert an upload and make the result downloadable
    ///
    /// `mode` must be `"compress"` or `"decompress"`. The job runs on its own
    /// task: if the caller goes away mid-job, the job still finishes and cleans
    /// up after itself.
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has started
    /// - [`Error::InvalidMode`] for an unrecognised mode
    /// - any pipeline error (see [`ConversionPipeline::process`])
    pub async fn submit(
        &self,
        bytes: Vec<u8>,
        original_filename: &str,
        mode: &str,
    ) -> Result<ConversionResult> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let mode: ConversionMode = match mode.parse() {
            Ok(mode) => mode,
            Err(e) => {
                tracing::debug!(mode, "rejecting job with invalid mode");
                self.emit_failure(&e);
                return Err(e);
            }
        };

        self.submit_request(ConversionRequest {
            source: UploadSource::Bytes(bytes),
            original_filename: original_filename.to_string(),
            mode,
        })
        .await
    }

    /// Run an already-built request (e.g. one whose upload is a file on disk)
    pub async fn submit_request(&self, request: ConversionRequest) -> Result<ConversionResult> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let permit = self
            .job_slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::ShuttingDown)?;

        let pipeline = self.pipeline.clone();
        let job = tokio::spawn(async move {
            let _permit = permit;
            pipeline.process(request).await
        });

        match job.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "conversion task aborted");
                Err(Error::conversion_failed(format!(
                    "conversion task aborted: {}",
                    e
                )))
            }
        }
    }

    /// Open a finished artifact for download
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown or already expired token.
    pub async fn retrieve(&self, filename: &str) -> Result<ArtifactDownload> {
        self.gate.fetch(filename).await
    }

    /// Subscribe to service events
    ///
    /// Each subscriber receives every event emitted after it subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Emit an event to all subscribers
    pub fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Name of the codec in use
    pub fn codec_name(&self) -> &'static str {
        self.pipeline.codec_name()
    }

    /// Whether `filename` is currently downloadable
    pub fn is_downloadable(&self, filename: &str) -> bool {
        self.gate.contains(filename)
    }

    /// Start the REST API server in a background task
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let service = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(service, config).await })
    }

    fn emit_failure(&self, error: &Error) {
        self.emit_event(Event::JobFailed {
            job_id: None,
            code: error.error_code().to_string(),
            error: error.to_string(),
        });
    }
}

/// Pick the codec executable described by `config`
///
/// # Errors
///
/// Returns [`Error::CodecLaunch`] if no explicit path is set and the binary is
/// not found in PATH (or PATH search is disabled).
pub fn resolve_codec(config: &CodecConfig) -> Result<CliCodec> {
    let codec = match &config.executable_path {
        Some(path) => Some(CliCodec::new(path.clone())),
        None if config.search_path => CliCodec::from_path(&config.binary_name),
        None => None,
    };

    codec
        .map(|codec| codec.with_timeout(config.timeout))
        .ok_or_else(|| Error::CodecLaunch {
            executable: config.binary_name.clone().into(),
            reason: if config.search_path {
                "not found in PATH".to_string()
            } else {
                "no executable_path configured and PATH search disabled".to_string()
            },
        })
}
