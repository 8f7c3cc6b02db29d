//! OpenDAL-backed blob store (S3-compatible, local filesystem, memory)

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use kac_core::config::{StorageBackend, StorageConfig};
use kac_core::{TransportError, HEADER_SUFFIX};
use opendal::{ErrorKind, Operator};

use crate::blob::{checked_name, BlobStore, StoredObject};

#[derive(Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl S3Credentials {
    /// Read `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY`, falling back to the
    /// `KAC_`-prefixed names.
    pub fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .or_else(|_| std::env::var("KAC_ACCESS_KEY_ID"))
            .context(
                "S3 credentials not set\n\
                 Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY environment variables.",
            )?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .or_else(|_| std::env::var("KAC_SECRET_ACCESS_KEY"))
            .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
        Ok(Self {
            access_key_id,
            secret_access_key,
        })
    }
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

/// Build an OpenDAL operator for the configured object-store backend.
///
/// If `enforce_tls` is true and the S3 endpoint uses HTTP, this returns an error.
/// Otherwise, a warning is logged for non-HTTPS endpoints.
pub fn build_operator(
    storage: &StorageConfig,
    credentials: Option<&S3Credentials>,
) -> Result<Operator> {
    let op = match storage.backend {
        StorageBackend::S3 => {
            if storage.endpoint.starts_with("http://") {
                if storage.enforce_tls {
                    anyhow::bail!(
                        "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                         Use an HTTPS endpoint or set storage.enforce_tls = false for local development.",
                        storage.endpoint
                    );
                }
                tracing::warn!(
                    endpoint = %storage.endpoint,
                    "S3 endpoint uses plaintext HTTP, credentials are transmitted unencrypted"
                );
            }
            let creds = credentials.context("S3 backend requires credentials")?;
            // opendal 0.55: consuming builder, path-style addressing by default
            let builder = opendal::services::S3::default()
                .endpoint(&storage.endpoint)
                .region(&storage.region)
                .bucket(&storage.bucket)
                .access_key_id(&creds.access_key_id)
                .secret_access_key(&creds.secret_access_key);
            Operator::new(builder)
                .context("creating OpenDAL S3 operator")?
                .finish()
        }
        StorageBackend::Fs => {
            let builder = opendal::services::Fs::default().root(&storage.root.to_string_lossy());
            Operator::new(builder)
                .context("creating OpenDAL fs operator")?
                .finish()
        }
        StorageBackend::Memory => Operator::new(opendal::services::Memory::default())
            .context("creating OpenDAL memory operator")?
            .finish(),
        StorageBackend::Relay => {
            anyhow::bail!("the relay backend is served by RelayClient, not OpenDAL")
        }
    };

    Ok(op.layer(opendal::layers::LoggingLayer::default()))
}

/// Blob store over any OpenDAL operator. Objects live at `<prefix>/<name>`
/// with headers at `<prefix>/<name>.hdr`.
pub struct OperatorStore {
    op: Operator,
    prefix: String,
    timeout: Duration,
    endpoint: String,
}

impl OperatorStore {
    pub fn new(op: Operator, prefix: &str, timeout: Duration) -> Self {
        let info = op.info();
        let endpoint = format!("{}://{}{}", info.scheme(), info.name(), info.root());
        Self {
            op,
            prefix: prefix.trim_matches('/').to_string(),
            timeout,
            endpoint,
        }
    }

    pub fn from_config(storage: &StorageConfig, credentials: Option<&S3Credentials>) -> Result<Self> {
        let op = build_operator(storage, credentials)?;
        Ok(Self::new(
            op,
            &storage.prefix,
            Duration::from_secs(storage.timeout_secs),
        ))
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    fn object_path(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }

    async fn bounded<T, F>(&self, name: &str, fut: F) -> Result<T, TransportError>
    where
        F: Future<Output = opendal::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                Err(TransportError::NotFound(name.to_string()))
            }
            Ok(Err(e)) => Err(TransportError::Request(e.to_string())),
            Err(_) => Err(TransportError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl BlobStore for OperatorStore {
    async fn put(
        &self,
        name: &str,
        ciphertext: Vec<u8>,
        header_json: String,
    ) -> Result<(), TransportError> {
        let name = checked_name(name)?;
        let path = self.object_path(name);
        let header_path = format!("{path}{HEADER_SUFFIX}");

        self.bounded(name, self.op.write(&path, ciphertext)).await?;
        self.bounded(name, self.op.write(&header_path, header_json))
            .await?;

        tracing::debug!(path = %path, "stored object and header");
        Ok(())
    }

    async fn get(
        &self,
        name: &str,
        attestation: Option<&[u8]>,
    ) -> Result<StoredObject, TransportError> {
        let name = checked_name(name)?;
        let path = self.object_path(name);
        let header_path = format!("{path}{HEADER_SUFFIX}");
        if let Some(sig) = attestation {
            // Object stores cannot check it; keep it in the request log.
            tracing::debug!(path = %path, attestation = %hex::encode(sig), "attested fetch");
        }

        let ciphertext = self.bounded(name, self.op.read(&path)).await?.to_vec();
        let header = self.bounded(name, self.op.read(&header_path)).await?;
        let header_json = String::from_utf8(header.to_vec())
            .map_err(|e| TransportError::InvalidHeader(format!("header is not UTF-8: {e}")))?;

        Ok(StoredObject {
            ciphertext,
            header_json,
        })
    }

    async fn probe(&self) -> Result<(), TransportError> {
        self.bounded("/", crate::health::check_health(&self.op)).await
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}
