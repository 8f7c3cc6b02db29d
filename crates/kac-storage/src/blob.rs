//! Blob store abstraction shared by the relay client and OpenDAL backends

use async_trait::async_trait;
use kac_core::TransportError;

/// Ciphertext and raw header JSON as fetched, before any parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub ciphertext: Vec<u8>,
    pub header_json: String,
}

/// Upload and fetch encrypted objects by name.
///
/// Implementations never retry. A failed or timed-out call is reported once
/// and the caller decides what to do.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `ciphertext` and its header under `name`, replacing any previous object.
    async fn put(
        &self,
        name: &str,
        ciphertext: Vec<u8>,
        header_json: String,
    ) -> Result<(), TransportError>;

    /// Fetch the object stored under `name`.
    ///
    /// `attestation` is a device signature forwarded to backends that can
    /// check it; the rest ignore it.
    async fn get(
        &self,
        name: &str,
        attestation: Option<&[u8]>,
    ) -> Result<StoredObject, TransportError>;

    /// Check the backend is reachable without touching any object.
    async fn probe(&self) -> Result<(), TransportError>;

    /// Human-readable location, recorded in audit reports.
    fn endpoint(&self) -> String;
}

/// Accept only names that address a single object: a bare basename.
pub(crate) fn checked_name(name: &str) -> Result<&str, TransportError> {
    match kac_core::object_basename(name) {
        Some(base) if base == name => Ok(name),
        _ => Err(TransportError::InvalidName(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_name() {
        assert_eq!(checked_name("report.pdf").unwrap(), "report.pdf");
        assert!(matches!(
            checked_name("../report.pdf"),
            Err(TransportError::InvalidName(_))
        ));
        assert!(checked_name("a/b").is_err());
        assert!(checked_name("..").is_err());
        assert!(checked_name("").is_err());
    }
}
