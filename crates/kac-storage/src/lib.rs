//! kac-storage: where ciphertext and headers live
//!
//! Every backend stores an object as two blobs, the opaque ciphertext under
//! its name and the header JSON under `<name>.hdr`. Names are basenames only.

pub mod blob;
pub mod health;
pub mod operator;
pub mod relay;

use std::sync::Arc;

use anyhow::Result;
use kac_core::config::{StorageBackend, StorageConfig};

pub use blob::{BlobStore, StoredObject};
pub use health::check_health;
pub use operator::{build_operator, OperatorStore, S3Credentials};
pub use relay::RelayClient;

/// Build the blob store selected by `storage.backend`.
///
/// S3 credentials are only consulted for the S3 backend.
pub fn open_store(
    storage: &StorageConfig,
    credentials: Option<&S3Credentials>,
) -> Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match storage.backend {
        StorageBackend::Relay => Arc::new(RelayClient::from_config(storage)?),
        _ => Arc::new(OperatorStore::from_config(storage, credentials)?),
    };
    tracing::debug!(endpoint = %store.endpoint(), "opened blob store");
    Ok(store)
}
