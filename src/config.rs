//! Configuration types for ppconv

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Transient storage directories
///
/// Both directories are created at service start if absent. Nothing in them
/// survives a restart.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// Inbound staging directory for uploads (default: "./uploads")
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Outbound directory for codec results (default: "./outputs")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Delete leftovers of a previous process at startup (default: true)
    #[serde(default = "default_true")]
    pub purge_on_start: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
            purge_on_start: true,
        }
    }
}

/// External codec settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CodecConfig {
    /// Path to the codec executable (auto-detected if None)
    #[serde(default)]
    pub executable_path: Option<PathBuf>,

    /// Name searched for in PATH when `executable_path` is not set (default: "compress")
    #[serde(default = "default_binary_name")]
    pub binary_name: String,

    /// Whether to search PATH if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Upper bound on a single codec run (default: 60s)
    #[serde(default = "default_codec_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Maximum conversions running at once (default: 4)
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            executable_path: None,
            binary_name: default_binary_name(),
            search_path: true,
            timeout: default_codec_timeout(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

/// Download gate expiry policy
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Delay between the end of a download and deletion of the artifact (default: 5s)
    ///
    /// A retry or resumed read inside this window still succeeds and pushes
    /// deletion back.
    #[serde(default = "default_expiry_grace", with = "duration_serde")]
    pub expiry_grace: Duration,

    /// Lifetime of an artifact nobody ever fetched (default: 600s, None = keep until shutdown)
    #[serde(default = "default_unclaimed_ttl", with = "optional_duration_serde")]
    pub unclaimed_ttl: Option<Duration>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            expiry_grace: default_expiry_grace(),
            unclaimed_ttl: default_unclaimed_ttl(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:5000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["http://localhost:5173"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Largest accepted upload body in bytes (default: 50 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            max_upload_bytes: default_max_upload_bytes(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for [`ConversionService`](crate::ConversionService)
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Transient directories
    #[serde(default)]
    pub storage: StorageConfig,

    /// External codec invocation
    #[serde(default)]
    pub codec: CodecConfig,

    /// Download gate expiry policy
    #[serde(default)]
    pub download: DownloadConfig,

    /// REST API
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.codec.timeout.is_zero() {
            return Err(Error::Config {
                message: "codec timeout must be greater than zero".into(),
                key: Some("codec.timeout".into()),
            });
        }
        if self.codec.max_concurrent_jobs == 0 {
            return Err(Error::Config {
                message: "at least one concurrent job is required".into(),
                key: Some("codec.max_concurrent_jobs".into()),
            });
        }
        if self.storage.upload_dir == self.storage.output_dir {
            return Err(Error::Config {
                message: "upload and output directories must differ".into(),
                key: Some("storage.output_dir".into()),
            });
        }
        Ok(())
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./outputs")
}

fn default_binary_name() -> String {
    "compress".into()
}

fn default_true() -> bool {
    true
}

fn default_codec_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_expiry_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_unclaimed_ttl() -> Option<Duration> {
    Some(Duration::from_secs(600))
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".into()]
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
