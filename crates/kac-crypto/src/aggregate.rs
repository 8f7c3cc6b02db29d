//! Aggregate key: the per-device capability delivered by issuance

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::classes::ClassSet;
use crate::params::SystemId;
use crate::KEY_SIZE;

/// A device's aggregate key. Holding it and being listed for class C is
/// necessary and sufficient to decrypt class-C objects of the same system.
///
/// Key bytes are zeroized on drop and redacted from `Debug`.
#[derive(Clone)]
pub struct AggregateKey {
    pub device_name: String,
    pub classes: ClassSet,
    pub system_id: SystemId,
    key: [u8; KEY_SIZE],
}

/// On-disk form: `{"device", "classes", "key", "system_id"}`
#[derive(Serialize, Deserialize)]
struct AggregateKeyFile {
    device: String,
    classes: ClassSet,
    key: String,
    system_id: String,
}

impl AggregateKey {
    pub fn new(
        device_name: impl Into<String>,
        classes: ClassSet,
        system_id: SystemId,
        key: [u8; KEY_SIZE],
    ) -> Self {
        Self {
            device_name: device_name.into(),
            classes,
            system_id,
            key,
        }
    }

    pub fn key_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// Conventional file name for an issued key: `<device>_agg.json`
    pub fn file_name(device_name: &str) -> PathBuf {
        PathBuf::from(format!("{device_name}_agg.json"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let parsed: Result<AggregateKeyFile, _> = serde_json::from_str(&content);
        content.zeroize();
        let mut file = parsed.context("parsing aggregate key file")?;

        let mut key = [0u8; KEY_SIZE];
        let decoded = hex::decode_to_slice(&file.key, &mut key)
            .map_err(|e| anyhow::anyhow!("field 'key': {e} (expected {KEY_SIZE} hex-encoded bytes)"));
        file.key.zeroize();
        decoded?;

        Ok(Self {
            device_name: file.device,
            classes: file.classes,
            system_id: SystemId::from_hex(&file.system_id)?,
            key,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut file = AggregateKeyFile {
            device: self.device_name.clone(),
            classes: self.classes.clone(),
            key: hex::encode(self.key),
            system_id: self.system_id.to_hex(),
        };
        let serialized = serde_json::to_string_pretty(&file);
        file.key.zeroize();
        let mut json = serialized.context("serializing aggregate key")?;
        let written = crate::write_private(path, json.as_bytes())
            .with_context(|| format!("writing aggregate key: {}", path.display()));
        json.zeroize();
        written
    }
}

impl Drop for AggregateKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for AggregateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateKey")
            .field("device_name", &self.device_name)
            .field("classes", &self.classes)
            .field("system_id", &self.system_id)
            .field("key", &"[REDACTED]")
            .finish()
    }
}
