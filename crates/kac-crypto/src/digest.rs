//! SHA-256 digests used in headers, reports, and sidecars

use sha2::{Digest, Sha256};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Lower-case hex SHA-256, the form every kac artifact carries.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}
