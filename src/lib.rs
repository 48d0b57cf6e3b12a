//! # ppconv
//!
//! Conversion job pipeline around an external bitmap <-> `.pp` image codec.
//!
//! ## Design Philosophy
//!
//! ppconv is designed to be:
//! - **Stateless between jobs** - Every upload is staged, converted and cleaned up on its own
//! - **Leak-free** - No failure, timeout or cancellation leaves a file behind
//! - **One-shot downloads** - A finished artifact is served once, then deleted
//! - **Event-driven** - Consumers subscribe to job events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use ppconv::{ConversionService, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ConversionService::with_default_codec(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = service.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let bitmap = std::fs::read("photo.bmp")?;
//!     let result = service.submit(bitmap, "photo.bmp", "compress").await?;
//!     println!("download token: {}", result.output_filename);
//!
//!     let compressed = service.retrieve(&result.output_filename).await?.read_to_end().await?;
//!     std::fs::write("photo.pp", compressed)?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// External codec invocation
pub mod codec;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// One-shot download gate
pub mod gate;
/// Conversion job pipeline
pub mod pipeline;
/// Service facade and lifecycle
pub mod service;
/// Transient upload and output storage
pub mod store;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use codec::{CliCodec, Codec, CodecOutcome, CopyCodec};
pub use config::Config;
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use gate::{ArtifactDownload, DownloadGate};
pub use pipeline::ConversionPipeline;
pub use service::{ConversionService, resolve_codec};
pub use store::ArtifactStore;
pub use types::{
    ConversionMode, ConversionRequest, ConversionResult, Event, JobId, UploadSource,
};

/// Run the service until a termination signal arrives, then shut it down.
///
/// - **Unix:** SIGTERM or SIGINT. A handler that cannot be installed is skipped.
/// - **Windows/other:** Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use ppconv::{ConversionService, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = ConversionService::with_default_codec(Config::default()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(service).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(service: ConversionService) -> Result<()> {
    let mut signals = ShutdownSignals::install();
    let signal = signals.recv().await;
    tracing::info!(signal, "shutdown requested, draining running jobs");
    service.shutdown().await
}

/// Signals that end [`run_with_shutdown`]
struct ShutdownSignals {
    #[cfg(unix)]
    terminate: Option<tokio::signal::unix::Signal>,
    #[cfg(unix)]
    interrupt: Option<tokio::signal::unix::Signal>,
}

impl ShutdownSignals {
    /// Must be called inside a tokio runtime
    #[cfg(unix)]
    fn install() -> Self {
        use tokio::signal::unix::{SignalKind, signal};

        let listen = |kind: SignalKind, name: &str| match signal(kind) {
            Ok(stream) => Some(stream),
            Err(e) => {
                tracing::warn!(signal = name, error = %e, "cannot listen for signal");
                None
            }
        };
        Self {
            terminate: listen(SignalKind::terminate(), "SIGTERM"),
            interrupt: listen(SignalKind::interrupt(), "SIGINT"),
        }
    }

    #[cfg(not(unix))]
    fn install() -> Self {
        Self {}
    }

    /// Wait for the first signal and return its name
    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        async fn next(stream: Option<&mut tokio::signal::unix::Signal>) -> Option<()> {
            match stream {
                Some(stream) => stream.recv().await,
                None => None,
            }
        }

        tokio::select! {
            Some(()) = next(self.terminate.as_mut()) => "SIGTERM",
            Some(()) = next(self.interrupt.as_mut()) => "SIGINT",
            else => {
                tracing::error!("no shutdown signal can be received");
                std::future::pending().await
            }
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        "Ctrl+C"
    }
}
