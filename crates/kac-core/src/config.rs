use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{KacError, KacResult};

/// Top-level configuration (loaded from kac.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KacConfig {
    pub device: DeviceConfig,
    pub issuer: IssuerConfig,
    pub storage: StorageConfig,
    pub gate: GateConfig,
    pub attestation: AttestationConfig,
    pub sensor: SensorConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl KacConfig {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> KacResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| KacError::file(path, e))?;
        toml::from_str(&content)
            .map_err(|e| KacError::Config(format!("parsing {}: {e}", path.display())))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Well-known location of this device's aggregate key file
    pub aggregate_key: PathBuf,
    /// Device name (informational; the key file carries the authoritative one)
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// Directory holding system_params.json and issued `<device>_agg.json` files
    pub keys_dir: PathBuf,
    /// Class catalogue written at bootstrap
    pub supported_classes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// HTTP blob relay (`/upload`, `/download/<name>`)
    Relay,
    /// S3-compatible object store
    S3,
    /// Local directory (single host / testing)
    Fs,
    /// Process-local memory (testing)
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Relay base URL
    pub relay_url: String,
    /// S3 endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// S3 bucket
    pub bucket: String,
    /// Root directory for the fs backend
    pub root: PathBuf,
    /// Key prefix for object-store backends
    pub prefix: String,
    /// Refuse plaintext-HTTP endpoints instead of warning
    pub enforce_tls: bool,
    /// Upper bound on any single storage request
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// JSON allow-list mapping presented token UIDs to principal names
    pub allowlist: PathBuf,
    /// Upper bound on waiting for a token presentation
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttestationConfig {
    pub enabled: bool,
    /// Hex-encoded 32-byte Ed25519 device seed
    pub key_file: Option<PathBuf>,
    /// Fixed challenge signed before each fetch
    pub challenge: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// JSON snapshot `{temperature, humidity, pressure}` kept fresh by an external sampler
    pub snapshot_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where `enc_report_<file>.json` audit reports are written
    pub report_dir: PathBuf,
    /// Where `<file>.sha256` sidecars are written
    pub sidecar_dir: PathBuf,
    /// Where recovered `dec_<name>` plaintexts are written
    pub plaintext_dir: PathBuf,
    /// Where the text viewer exports decoded text
    pub export_dir: PathBuf,
    pub viewer_columns: usize,
    pub viewer_page_lines: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            aggregate_key: PathBuf::from("/etc/kac_agg.json"),
            name: None,
        }
    }
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            keys_dir: PathBuf::from("keys"),
            supported_classes: ["finance", "iot", "hr", "security"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Relay,
            relay_url: "http://localhost:5000".into(),
            endpoint: "http://localhost:8333".into(),
            region: "us-east-1".into(),
            bucket: "kac".into(),
            root: PathBuf::from("storage"),
            prefix: String::new(),
            enforce_tls: false,
            timeout_secs: 10,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            allowlist: PathBuf::from("authorized_tags.json"),
            timeout_secs: 120,
        }
    }
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            key_file: None,
            challenge: "KAC decrypt auth".into(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_dir: PathBuf::from("."),
            sidecar_dir: PathBuf::from("."),
            plaintext_dir: PathBuf::from("."),
            export_dir: PathBuf::from("exports"),
            viewer_columns: 21,
            viewer_page_lines: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}
