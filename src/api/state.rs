//! Application state for the API server

use crate::{Config, ConversionService};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// The conversion service handling uploads and downloads
    pub service: Arc<ConversionService>,

    /// Configuration the server was started with
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(service: Arc<ConversionService>, config: Arc<Config>) -> Self {
        Self { service, config }
    }
}
