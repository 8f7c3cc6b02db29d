//! kac-pipeline: encryption and decryption pipelines
//!
//! Both pipelines take their collaborators as trait objects: key wrap
//! ([`kac_crypto::KeyWrap`]), storage ([`kac_storage::BlobStore`]) and the
//! device traits from `kac-device`. Nothing here reads configuration.

pub mod artifacts;
pub mod decrypt;
pub mod encrypt;
pub mod target;

pub use decrypt::{DecryptPipeline, Decrypted, DEFAULT_CHALLENGE};
pub use encrypt::{EncryptPipeline, EncryptReceipt};
pub use target::Target;
