//! Decryption pipeline
//!
//! ```text
//! RESOLVE → GATE → ATTEST? → FETCH → AUTHORIZE → UNWRAP+DECRYPT → VERIFY → WRITE → PRESENT
//! ```
//!
//! Every terminal condition produces exactly one denial feedback call and
//! one error. AUTHORIZE always runs before the key is unwrapped, and a
//! gate refusal stops the run before storage is contacted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use kac_core::{
    Denial, EncryptionHeader, IntegrityError, KacError, KacResult, TransportError,
};
use kac_crypto::{open, sha256_hex, KeyWrap, NONCE_SIZE, TAG_SIZE};
use kac_device::{Attestor, ConsoleFeedback, Feedback, PresenceGate, TextViewer};
use kac_storage::BlobStore;
use zeroize::Zeroizing;

use crate::artifacts;
use crate::target::Target;

/// Challenge signed by the attestor before each fetch
pub const DEFAULT_CHALLENGE: &str = "KAC decrypt auth";

const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_secs(120);

/// What one successful decryption produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    pub object_name: String,
    pub principal: String,
    pub class: String,
    pub output_path: PathBuf,
    pub plaintext_sha256: String,
    pub size_bytes: u64,
    /// Whether a sidecar digest was supplied and matched
    pub sidecar_verified: bool,
}

pub struct DecryptPipeline {
    gate: Arc<dyn PresenceGate>,
    gate_timeout: Duration,
    attestor: Option<Arc<dyn Attestor>>,
    challenge: Vec<u8>,
    store: Arc<dyn BlobStore>,
    engine: Arc<dyn KeyWrap>,
    feedback: Arc<dyn Feedback>,
    viewer: Option<Arc<dyn TextViewer>>,
    output_dir: PathBuf,
}

impl DecryptPipeline {
    pub fn new(
        gate: Arc<dyn PresenceGate>,
        store: Arc<dyn BlobStore>,
        engine: Arc<dyn KeyWrap>,
    ) -> Self {
        Self {
            gate,
            gate_timeout: DEFAULT_GATE_TIMEOUT,
            attestor: None,
            challenge: DEFAULT_CHALLENGE.as_bytes().to_vec(),
            store,
            engine,
            feedback: Arc::new(ConsoleFeedback),
            viewer: None,
            output_dir: PathBuf::from("."),
        }
    }

    pub fn with_gate_timeout(mut self, timeout: Duration) -> Self {
        self.gate_timeout = timeout;
        self
    }

    pub fn with_attestor(mut self, attestor: Arc<dyn Attestor>, challenge: impl Into<Vec<u8>>) -> Self {
        self.attestor = Some(attestor);
        self.challenge = challenge.into();
        self
    }

    pub fn with_feedback(mut self, feedback: Arc<dyn Feedback>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn with_viewer(mut self, viewer: Arc<dyn TextViewer>) -> Self {
        self.viewer = Some(viewer);
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Decrypt the object named by `arg`, an object name or a sidecar path.
    pub async fn decrypt(&self, arg: &str) -> KacResult<Decrypted> {
        match self.run(arg).await {
            Ok(done) => Ok(done),
            Err(Failure { error, lines }) => {
                tracing::warn!(error = %error, "decryption stopped");
                self.feedback.present(false, &lines);
                Err(error)
            }
        }
    }

    async fn run(&self, arg: &str) -> Result<Decrypted, Failure> {
        // RESOLVE
        let target = Target::resolve(arg).map_err(|e| Failure::new(e, ["Bad request"]))?;
        tracing::info!(
            stage = "resolve",
            object = %target.object_name,
            sidecar = target.expected_digest.is_some(),
            "resolved target"
        );

        // GATE
        let principal = self.pass_gate().await?;

        // ATTEST
        let signature = self.attest();

        // FETCH
        tracing::info!(stage = "fetch", object = %target.object_name, "fetching");
        let object = self
            .store
            .get(&target.object_name, signature.as_deref())
            .await
            .map_err(Failure::transport)?;
        let header = EncryptionHeader::from_json(&object.header_json)
            .map_err(|e| Failure::new(e.into(), ["Header invalid"]))?;

        // AUTHORIZE
        let class = header.class.clone();
        if !self.engine.authorized(&class) {
            return Err(Failure::new(
                Denial::Class {
                    class: class.clone(),
                }
                .into(),
                [format!("Denied {class}"), "Not in key classes".to_string()],
            ));
        }
        tracing::info!(stage = "authorize", class = %class, "class granted");

        // UNWRAP + DECRYPT
        let plaintext = self
            .unwrap_and_open(&header, &object.ciphertext)
            .map_err(|e| {
                Failure::new(
                    IntegrityError::Decryption(format!("{e:#}")).into(),
                    ["Decrypt error"],
                )
            })?;

        // VERIFY
        let actual = sha256_hex(&plaintext);
        if let Some(expected) = header.plaintext_sha256.as_deref().filter(|h| !h.is_empty()) {
            if expected.to_ascii_lowercase() != actual {
                return Err(Failure::new(
                    IntegrityError::HeaderDigest {
                        expected: expected.to_string(),
                        actual,
                    }
                    .into(),
                    ["Hash mismatch", "header"],
                ));
            }
        }
        if let Some(expected) = target.expected_digest.as_deref() {
            if expected != actual {
                return Err(Failure::new(
                    IntegrityError::SidecarDigest {
                        expected: expected.to_string(),
                        actual,
                    }
                    .into(),
                    ["Hash mismatch", ".sha256"],
                ));
            }
        }
        tracing::info!(stage = "verify", digest = %actual, "plaintext verified");

        // WRITE
        let output_path = artifacts::plaintext_path(&self.output_dir, &target.object_name);
        artifacts::write_file(&output_path, &plaintext)
            .await
            .map_err(|e| Failure::new(e, ["Write error"]))?;
        tracing::info!(stage = "write", path = %output_path.display(), "wrote plaintext");

        // PRESENT
        self.feedback.present(
            true,
            &[
                format!("Welcome {principal}"),
                format!("Class {class}"),
                "Access granted".to_string(),
            ],
        );
        self.preview(&output_path, &plaintext);

        Ok(Decrypted {
            object_name: target.object_name,
            principal,
            class,
            output_path,
            plaintext_sha256: actual,
            size_bytes: plaintext.len() as u64,
            sidecar_verified: target.expected_digest.is_some(),
        })
    }

    async fn pass_gate(&self) -> Result<String, Failure> {
        tracing::info!(stage = "gate", timeout = ?self.gate_timeout, "waiting for token");
        let presentation =
            match tokio::time::timeout(self.gate_timeout, self.gate.wait_for_presentation()).await
            {
                Ok(Ok(p)) => p,
                Ok(Err(e)) => {
                    return Err(Failure::new(
                        Denial::GateUnavailable(format!("{e:#}")).into(),
                        ["Gate error"],
                    ))
                }
                Err(_) => {
                    return Err(Failure::new(
                        Denial::GateTimeout(self.gate_timeout).into(),
                        ["Gate timeout"],
                    ))
                }
            };

        if !presentation.authorized {
            return Err(Failure::new(
                Denial::Gate {
                    principal: presentation.principal.clone(),
                }
                .into(),
                ["RFID denied".to_string(), presentation.principal],
            ));
        }
        tracing::info!(stage = "gate", principal = %presentation.principal, "token accepted");
        Ok(presentation.principal)
    }

    /// Best effort: a failing attestor means the fetch goes out unsigned.
    fn attest(&self) -> Option<Vec<u8>> {
        let attestor = self.attestor.as_ref()?;
        match attestor.sign(&self.challenge) {
            Ok(sig) => {
                tracing::debug!(stage = "attest", "signed challenge");
                Some(sig)
            }
            Err(e) => {
                tracing::debug!(stage = "attest", error = %format!("{e:#}"), "attestation skipped");
                None
            }
        }
    }

    fn unwrap_and_open(
        &self,
        header: &EncryptionHeader,
        ciphertext: &[u8],
    ) -> anyhow::Result<Zeroizing<Vec<u8>>> {
        let content_key = self.engine.unwrap(&header.wrapped_key)?;
        let nonce = header.nonce_bytes::<NONCE_SIZE>()?;
        let tag = header.tag_bytes::<TAG_SIZE>()?;
        Ok(Zeroizing::new(open(&content_key, &nonce, ciphertext, &tag)?))
    }

    fn preview(&self, output_path: &std::path::Path, plaintext: &[u8]) {
        let Some(viewer) = &self.viewer else {
            return;
        };
        let Ok(text) = std::str::from_utf8(plaintext) else {
            return;
        };
        let title = output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Err(e) = viewer.view(&title, text) {
            tracing::warn!(error = %format!("{e:#}"), "text preview failed");
        }
    }
}

/// A terminal stage outcome: the error and the feedback lines describing it
struct Failure {
    error: KacError,
    lines: Vec<String>,
}

impl Failure {
    fn new<I, S>(error: KacError, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            error,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    fn transport(error: TransportError) -> Self {
        let detail = match &error {
            TransportError::Status { status } => Some(status.to_string()),
            TransportError::NotFound(_) => Some("Not found".to_string()),
            TransportError::Timeout(_) => Some("Timed out".to_string()),
            TransportError::InvalidHeader(_) => None,
            TransportError::Request(_) | TransportError::InvalidName(_) => {
                Some("Request failed".to_string())
            }
        };
        match detail {
            Some(detail) => Self::new(error.into(), ["Cloud error".to_string(), detail]),
            None => Self::new(error.into(), ["Header invalid"]),
        }
    }
}
