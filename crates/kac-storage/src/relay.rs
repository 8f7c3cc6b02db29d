//! HTTP relay client
//!
//! Wire protocol:
//! ```text
//! POST {base}/upload          multipart: file=<ciphertext>, header=<json>, filename=<name>
//! GET  {base}/download/{name} body=<ciphertext>, X-KAC-HEADER: <json>
//!                             request may carry X-ATECC-SIG: <hex signature>
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use kac_core::config::StorageConfig;
use kac_core::TransportError;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};

use crate::blob::{checked_name, BlobStore, StoredObject};

/// Response header carrying the object's header JSON
pub const HEADER_FIELD: &str = "X-KAC-HEADER";

/// Request header carrying the hex attestation signature
pub const ATTESTATION_FIELD: &str = "X-ATECC-SIG";

pub struct RelayClient {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl RelayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid relay URL: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("relay URL cannot be a base: {base_url}");
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn from_config(storage: &StorageConfig) -> Result<Self> {
        if storage.relay_url.starts_with("http://") {
            if storage.enforce_tls {
                anyhow::bail!(
                    "relay URL uses plaintext HTTP ({}), but enforce_tls is enabled",
                    storage.relay_url
                );
            }
            tracing::warn!(url = %storage.relay_url, "relay uses plaintext HTTP");
        }
        Self::new(&storage.relay_url, Duration::from_secs(storage.timeout_secs))
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn transport_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl BlobStore for RelayClient {
    async fn put(
        &self,
        name: &str,
        ciphertext: Vec<u8>,
        header_json: String,
    ) -> Result<(), TransportError> {
        let name = checked_name(name)?;
        let form = Form::new()
            .part("file", Part::bytes(ciphertext).file_name(name.to_string()))
            .text("header", header_json)
            .text("filename", name.to_string());

        let resp = self
            .client
            .post(self.url(&["upload"]))
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }
        tracing::debug!(name, "uploaded to relay");
        Ok(())
    }

    async fn get(
        &self,
        name: &str,
        attestation: Option<&[u8]>,
    ) -> Result<StoredObject, TransportError> {
        let name = checked_name(name)?;
        let mut req = self.client.get(self.url(&["download", name]));
        if let Some(sig) = attestation {
            req = req.header(ATTESTATION_FIELD, hex::encode(sig));
        }

        let resp = req.send().await.map_err(|e| self.transport_error(e))?;
        match resp.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(TransportError::NotFound(name.to_string())),
            other => {
                return Err(TransportError::Status {
                    status: other.as_u16(),
                })
            }
        }

        let header_json = resp
            .headers()
            .get(HEADER_FIELD)
            .ok_or_else(|| TransportError::InvalidHeader(format!("missing {HEADER_FIELD}")))?
            .to_str()
            .map_err(|e| TransportError::InvalidHeader(e.to_string()))?
            .to_string();
        let ciphertext = resp
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?
            .to_vec();

        Ok(StoredObject {
            ciphertext,
            header_json,
        })
    }

    async fn probe(&self) -> Result<(), TransportError> {
        let resp = self
            .client
            .get(self.base_url.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        if resp.status().is_server_error() {
            return Err(TransportError::Status {
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }

    fn endpoint(&self) -> String {
        self.base_url.to_string()
    }
}
