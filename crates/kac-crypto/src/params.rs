//! System parameters: the issuance authority's secret state

use std::path::Path;

use anyhow::{Context, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::classes::ClassSet;
use crate::{KEY_SIZE, SYSTEM_ID_SIZE};

/// File name of the parameter store inside the issuer's keys directory
pub const PARAMS_FILE: &str = "system_params.json";

/// Opaque system identifier, stamped into every issued aggregate key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemId([u8; SYSTEM_ID_SIZE]);

impl SystemId {
    pub fn from_bytes(bytes: [u8; SYSTEM_ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = [0u8; SYSTEM_ID_SIZE];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| anyhow::anyhow!("invalid system id {s:?}: {e}"))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for SystemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The 256-bit system-wide master secret. Zeroized on drop.
#[derive(Clone)]
pub struct MasterSecret {
    bytes: [u8; KEY_SIZE],
}

impl MasterSecret {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for MasterSecret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterSecret")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SystemParameters {
    pub system_id: SystemId,
    pub master_secret: MasterSecret,
    pub supported_classes: ClassSet,
}

#[derive(Serialize, Deserialize)]
struct ParamsFile {
    system_id: String,
    master_secret: String,
    public_params: PublicParams,
}

#[derive(Serialize, Deserialize)]
struct PublicParams {
    algo: String,
    classes_supported: ClassSet,
}

impl SystemParameters {
    /// Bootstrap: fresh random system id and master secret.
    pub fn generate(supported_classes: ClassSet) -> Self {
        let mut rng = rand::thread_rng();
        let mut id = [0u8; SYSTEM_ID_SIZE];
        rng.fill_bytes(&mut id);
        let mut secret = [0u8; KEY_SIZE];
        rng.fill_bytes(&mut secret);

        let params = Self {
            system_id: SystemId::from_bytes(id),
            master_secret: MasterSecret::from_bytes(secret),
            supported_classes,
        };
        secret.zeroize();
        params
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading system parameters: {}", path.display()))?;
        let file: ParamsFile = serde_json::from_str(&content)
            .with_context(|| format!("parsing system parameters: {}", path.display()))?;

        let mut secret = [0u8; KEY_SIZE];
        hex::decode_to_slice(&file.master_secret, &mut secret)
            .map_err(|e| anyhow::anyhow!("invalid master_secret: {e}"))?;

        Ok(Self {
            system_id: SystemId::from_hex(&file.system_id)?,
            master_secret: MasterSecret::from_bytes(secret),
            supported_classes: file.public_params.classes_supported,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = ParamsFile {
            system_id: self.system_id.to_hex(),
            master_secret: hex::encode(self.master_secret.as_bytes()),
            public_params: PublicParams {
                algo: "AES-GCM".into(),
                classes_supported: self.supported_classes.clone(),
            },
        };
        let mut json =
            serde_json::to_string_pretty(&file).context("serializing system parameters")?;
        let written = crate::write_private(path, json.as_bytes())
            .with_context(|| format!("writing system parameters: {}", path.display()));
        json.zeroize();
        written
    }
}
