//! Aggregate key issuance

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::aggregate::AggregateKey;
use crate::classes::ClassSet;
use crate::params::{MasterSecret, SystemParameters, PARAMS_FILE};
use crate::KEY_SIZE;

/// `SHA-256(master || ",".join(sorted(classes)))`
///
/// Deterministic in the class *set*: order and duplicates of the request
/// do not matter once it has been collected into a [`ClassSet`].
pub fn derive_aggregate_key(master: &MasterSecret, classes: &ClassSet) -> [u8; KEY_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(master.as_bytes());
    hasher.update(classes.canonical().as_bytes());
    hasher.finalize().into()
}

/// The issuance authority. Holds the master secret, never leaves the issuer host.
#[derive(Debug)]
pub struct Issuer {
    params: SystemParameters,
}

impl Issuer {
    pub fn new(params: SystemParameters) -> Self {
        Self { params }
    }

    /// Load the parameter store from `<keys_dir>/system_params.json`.
    pub fn from_keys_dir(keys_dir: &Path) -> Result<Self> {
        let path = keys_dir.join(PARAMS_FILE);
        if !path.exists() {
            anyhow::bail!(
                "no system parameters at {} (run `kac setup` first)",
                path.display()
            );
        }
        Ok(Self::new(SystemParameters::load(&path)?))
    }

    pub fn params(&self) -> &SystemParameters {
        &self.params
    }

    /// Issue an aggregate key for `device_name` covering `classes`.
    pub fn issue(&self, device_name: &str, classes: &ClassSet) -> Result<AggregateKey> {
        if kac_core::object_basename(device_name).as_deref() != Some(device_name) {
            anyhow::bail!("invalid device name {device_name:?}");
        }
        if classes.is_empty() {
            anyhow::bail!("at least one class is required");
        }
        let unsupported = classes.missing_from(&self.params.supported_classes);
        if !unsupported.is_empty() {
            anyhow::bail!(
                "unsupported classes: {} (supported: {})",
                unsupported.join(", "),
                self.params.supported_classes
            );
        }

        let key = derive_aggregate_key(&self.params.master_secret, classes);
        tracing::info!(device = %device_name, classes = %classes, "issued aggregate key");
        Ok(AggregateKey::new(
            device_name,
            classes.clone(),
            self.params.system_id,
            key,
        ))
    }

    /// Issue and persist to `<dir>/<device>_agg.json`.
    pub fn issue_to_dir(
        &self,
        device_name: &str,
        classes: &ClassSet,
        dir: &Path,
    ) -> Result<(AggregateKey, PathBuf)> {
        let key = self.issue(device_name, classes)?;
        let path = dir.join(AggregateKey::file_name(device_name));
        key.save(&path)
            .with_context(|| format!("saving key for device '{device_name}'"))?;
        Ok((key, path))
    }
}
