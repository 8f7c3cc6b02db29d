//! Key-aggregate engine: class authorization and content-key wrap

use std::path::Path;

use kac_core::{KacError, KacResult};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::aggregate::AggregateKey;
use crate::classes::ClassSet;
use crate::KEY_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WrapError {
    #[error("key of {len} bytes exceeds the {max}-byte wrap window")]
    KeyTooLong { len: usize, max: usize },

    #[error("wrapped key is not valid hex: {0}")]
    Hex(String),
}

/// The seam between pipelines and the wrap construction.
///
/// Pipelines call `authorized` before `unwrap` and never touch key bytes
/// directly, so a stronger wrap can replace [`KeyAggregateEngine`] without
/// changing them.
pub trait KeyWrap: Send + Sync {
    /// Whether this device may open objects of `class`.
    fn authorized(&self, class: &str) -> bool;

    /// Wrap a content key, returning lower-case hex.
    fn wrap(&self, content_key: &[u8]) -> Result<String, WrapError>;

    /// Recover a content key from its hex wrap.
    ///
    /// There is no integrity check here: a wrong or garbled wrap yields
    /// wrong bytes, which surface later as an AEAD failure.
    fn unwrap(&self, wrapped_hex: &str) -> Result<Zeroizing<Vec<u8>>, WrapError>;
}

/// XOR keystream wrap under the device's aggregate key.
///
/// The pad is the fixed aggregate key, reused for every wrap. Two wrapped
/// keys from the same device XOR to the XOR of their content keys.
#[derive(Debug)]
pub struct KeyAggregateEngine {
    key: AggregateKey,
}

impl KeyAggregateEngine {
    pub fn new(key: AggregateKey) -> Self {
        Self { key }
    }

    /// Load the device's aggregate key once; it stays read-only afterwards.
    pub fn load(path: &Path) -> KacResult<Self> {
        let key = AggregateKey::load(path).map_err(|source| KacError::KeyLoad {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(
            device = %key.device_name,
            classes = %key.classes,
            system_id = %key.system_id,
            "loaded aggregate key"
        );
        Ok(Self::new(key))
    }

    pub fn aggregate_key(&self) -> &AggregateKey {
        &self.key
    }

    pub fn device_name(&self) -> &str {
        &self.key.device_name
    }

    pub fn classes(&self) -> &ClassSet {
        &self.key.classes
    }

    fn xor_window(&self, bytes: &[u8]) -> Result<Zeroizing<Vec<u8>>, WrapError> {
        if bytes.len() > KEY_SIZE {
            return Err(WrapError::KeyTooLong {
                len: bytes.len(),
                max: KEY_SIZE,
            });
        }
        let pad = self.key.key_bytes();
        Ok(Zeroizing::new(
            bytes.iter().zip(pad.iter()).map(|(b, k)| b ^ k).collect(),
        ))
    }
}

impl KeyWrap for KeyAggregateEngine {
    fn authorized(&self, class: &str) -> bool {
        self.key.classes.contains(class)
    }

    fn wrap(&self, content_key: &[u8]) -> Result<String, WrapError> {
        let wrapped = self.xor_window(content_key)?;
        Ok(hex::encode(wrapped.as_slice()))
    }

    fn unwrap(&self, wrapped_hex: &str) -> Result<Zeroizing<Vec<u8>>, WrapError> {
        let wrapped = hex::decode(wrapped_hex).map_err(|e| WrapError::Hex(e.to_string()))?;
        self.xor_window(&wrapped)
    }
}
