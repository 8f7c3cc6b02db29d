//! kac-crypto: key aggregation and content encryption for kac
//!
//! Key hierarchy:
//! ```text
//! Master Secret (256-bit, issuance authority only)
//!   └── Aggregate Key = SHA-256(master || ",".join(sorted(classes)))   (one per class set)
//!         ├── authorized(class): class ∈ classes
//!         └── wrap(content_key) = content_key XOR aggregate_key[..len]
//!               └── Content AEAD: AES-256-GCM (key=content_key, nonce=random_96bit, AAD=empty)
//! ```
//!
//! The wrap is a static keystream: every wrap under one aggregate key reuses
//! the same pad. It sits behind [`KeyWrap`] so pipelines never depend on it.

pub mod aead;
pub mod aggregate;
pub mod classes;
pub mod digest;
pub mod engine;
pub mod issuer;
pub mod params;

pub use aead::{generate_content_key, open, seal, ContentKey, Sealed};
pub use aggregate::AggregateKey;
pub use classes::{ClassError, ClassSet};
pub use digest::{sha256, sha256_hex};
pub use engine::{KeyAggregateEngine, KeyWrap, WrapError};
pub use issuer::{derive_aggregate_key, Issuer};
pub use params::{MasterSecret, SystemId, SystemParameters};

/// Size of master secrets, aggregate keys, and content keys (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of an AES-GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of an opaque system identifier
pub const SYSTEM_ID_SIZE: usize = 4;

/// Write a secret-bearing file, owner-only on Unix.
pub(crate) fn write_private(path: &std::path::Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
