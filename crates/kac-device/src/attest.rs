//! Device attestation: a signature over the fetch challenge

use std::path::Path;

use anyhow::{Context, Result};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use zeroize::Zeroize;

pub trait Attestor: Send + Sync {
    /// Sign `SHA-256(challenge)` with the device key.
    fn sign(&self, challenge: &[u8]) -> Result<Vec<u8>>;
}

/// Ed25519 attestor backed by a hex seed file, standing in for a secure element.
pub struct SoftwareAttestor {
    signing_key: SigningKey,
}

impl SoftwareAttestor {
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Load a 32-byte seed stored as hex.
    pub fn load(path: &Path) -> Result<Self> {
        let mut content = std::fs::read_to_string(path)
            .with_context(|| format!("reading attestation key: {}", path.display()))?;
        let mut seed = [0u8; 32];
        let decoded = hex::decode_to_slice(content.trim(), &mut seed)
            .map_err(|e| anyhow::anyhow!("attestation key must be 32 hex-encoded bytes: {e}"));
        content.zeroize();
        decoded?;

        let attestor = Self::from_seed(&seed);
        seed.zeroize();
        Ok(attestor)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl Attestor for SoftwareAttestor {
    fn sign(&self, challenge: &[u8]) -> Result<Vec<u8>> {
        let digest = kac_crypto::sha256(challenge);
        Ok(self.signing_key.sign(&digest).to_bytes().to_vec())
    }
}

impl std::fmt::Debug for SoftwareAttestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareAttestor")
            .field("verifying_key", &hex::encode(self.verifying_key().as_bytes()))
            .field("signing_key", &"[REDACTED]")
            .finish()
    }
}
