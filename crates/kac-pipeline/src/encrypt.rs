//! Encryption pipeline
//!
//! read → seal → wrap → header → upload → audit report + sidecar → feedback.
//! Local artifacts are written only once the upload has succeeded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use kac_core::{
    object_basename, AuditReport, EncryptionHeader, KacError, KacResult, SidecarHash,
};
use kac_crypto::{generate_content_key, seal, sha256_hex, ClassSet, KeyWrap};
use kac_device::{ConsoleFeedback, EnvironmentSensor, Feedback, NoSensor};
use kac_storage::BlobStore;

use crate::artifacts;

/// What one successful encryption produced
#[derive(Debug, Clone)]
pub struct EncryptReceipt {
    pub object_name: String,
    pub header: EncryptionHeader,
    pub report: AuditReport,
    pub report_path: PathBuf,
    pub sidecar_path: PathBuf,
}

pub struct EncryptPipeline {
    engine: Arc<dyn KeyWrap>,
    store: Arc<dyn BlobStore>,
    sensor: Arc<dyn EnvironmentSensor>,
    feedback: Arc<dyn Feedback>,
    report_dir: PathBuf,
    sidecar_dir: PathBuf,
}

impl EncryptPipeline {
    pub fn new(engine: Arc<dyn KeyWrap>, store: Arc<dyn BlobStore>) -> Self {
        Self {
            engine,
            store,
            sensor: Arc::new(NoSensor),
            feedback: Arc::new(ConsoleFeedback),
            report_dir: PathBuf::from("."),
            sidecar_dir: PathBuf::from("."),
        }
    }

    pub fn with_sensor(mut self, sensor: Arc<dyn EnvironmentSensor>) -> Self {
        self.sensor = sensor;
        self
    }

    pub fn with_feedback(mut self, feedback: Arc<dyn Feedback>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn with_output(mut self, report_dir: impl Into<PathBuf>, sidecar_dir: impl Into<PathBuf>) -> Self {
        self.report_dir = report_dir.into();
        self.sidecar_dir = sidecar_dir.into();
        self
    }

    /// Encrypt `path` under `class` and upload it under the file's basename.
    pub async fn encrypt(&self, path: &Path, class: &str) -> KacResult<EncryptReceipt> {
        ClassSet::new([class]).map_err(|e| KacError::InvalidClass {
            class: class.to_string(),
            reason: e.to_string(),
        })?;
        if !self.engine.authorized(class) {
            tracing::warn!(
                class,
                "class is not granted by this device's key; local peers cannot unwrap it"
            );
        }

        let object_name = object_basename(&path.to_string_lossy())
            .ok_or_else(|| KacError::Config(format!("no file name in {}", path.display())))?;

        tracing::info!(stage = "read", path = %path.display(), "reading plaintext");
        let plaintext = tokio::fs::read(path)
            .await
            .map_err(|e| KacError::file(path, e))?;

        tracing::info!(stage = "seal", bytes = plaintext.len(), "encrypting");
        let content_key = generate_content_key();
        let sealed = seal(&content_key, &plaintext)?;
        let environment = self.sensor.sample();

        let wrapped_key = self
            .engine
            .wrap(content_key.as_bytes())
            .context("wrapping content key")?;
        drop(content_key);

        let header = EncryptionHeader {
            class: class.to_string(),
            nonce: hex::encode(sealed.nonce),
            auth_tag: hex::encode(sealed.tag),
            wrapped_key,
            plaintext_sha256: Some(sha256_hex(&plaintext)),
            ciphertext_sha256: Some(sha256_hex(&sealed.ciphertext)),
            environment,
        };
        let header_json = header.to_json()?;

        tracing::info!(stage = "upload", object = %object_name, endpoint = %self.store.endpoint(), "uploading");
        self.store
            .put(&object_name, sealed.ciphertext, header_json)
            .await?;

        let plaintext_sha256 = header.plaintext_sha256.clone().unwrap_or_default();
        let report = AuditReport {
            timestamp: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            file: object_name.clone(),
            size_bytes: plaintext.len() as u64,
            class: class.to_string(),
            plaintext_sha256: plaintext_sha256.clone(),
            ciphertext_sha256: header.ciphertext_sha256.clone().unwrap_or_default(),
            nonce_hex: header.nonce.clone(),
            tag_hex: header.auth_tag.clone(),
            wrapped_key_hex: header.wrapped_key.clone(),
            storage_endpoint: self.store.endpoint(),
            env: header.environment,
        };

        tracing::info!(stage = "artifacts", object = %object_name, "writing audit report and sidecar");
        let report_path = artifacts::report_path(&self.report_dir, &object_name);
        artifacts::write_report(&report_path, &report).await?;
        let sidecar_path = artifacts::sidecar_path(&self.sidecar_dir, &object_name);
        artifacts::write_sidecar(
            &sidecar_path,
            &SidecarHash::new(plaintext_sha256, object_name.clone()),
        )
        .await?;

        self.feedback
            .present(true, &[format!("Encrypted {class}"), object_name.clone()]);

        Ok(EncryptReceipt {
            object_name,
            header,
            report,
            report_path,
            sidecar_path,
        })
    }
}
