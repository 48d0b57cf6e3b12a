//! Test configuration helpers for creating services around stub codecs

use ppconv::{Config, ConversionService};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Configuration rooted in `temp` that runs the executable at `codec`
///
/// Downloads expire 100ms after they finish so expiry is observable quickly.
pub fn stub_config(temp: &TempDir, codec: PathBuf) -> Config {
    let mut config = Config::default();
    config.storage.upload_dir = temp.path().join("uploads");
    config.storage.output_dir = temp.path().join("outputs");
    config.codec.executable_path = Some(codec);
    config.codec.timeout = Duration::from_secs(10);
    config.download.expiry_grace = Duration::from_millis(100);
    config.download.unclaimed_ttl = None;
    config
}

/// Create a service whose codec is the shell script `body`
///
/// Returns the service and the temp dir holding its directories and script;
/// keep the temp dir alive for the duration of the test.
pub async fn create_stub_service(body: &str) -> (ConversionService, TempDir) {
    create_stub_service_with(body, |_| {}).await
}

/// Like [`create_stub_service`], with a hook to adjust the config first
pub async fn create_stub_service_with(
    body: &str,
    adjust: impl FnOnce(&mut Config),
) -> (ConversionService, TempDir) {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let script = super::fixtures::write_codec_script(&temp, body);

    let mut config = stub_config(&temp, script);
    adjust(&mut config);

    let service = ConversionService::with_default_codec(config)
        .await
        .expect("Failed to create service");
    (service, temp)
}
