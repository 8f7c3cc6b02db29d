//! Resolving a decrypt argument to an object name and optional expected digest

use std::path::Path;

use kac_core::{object_basename, KacError, KacResult, SidecarHash, TransportError, SIDECAR_SUFFIX};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub object_name: String,
    /// Lower-case plaintext digest from a sidecar, if one was given
    pub expected_digest: Option<String>,
}

impl Target {
    /// An existing `*.sha256` path is read as a sidecar: its first usable
    /// line names the object and supplies the expected digest. A sidecar
    /// without one names the object by dropping the suffix. Anything else
    /// is taken as the object name itself.
    pub fn resolve(arg: &str) -> KacResult<Self> {
        let path = Path::new(arg);
        if arg.ends_with(SIDECAR_SUFFIX) && path.is_file() {
            let raw = std::fs::read(path).map_err(|e| KacError::file(path, e))?;
            let contents = String::from_utf8_lossy(&raw);
            if let Some(sidecar) = SidecarHash::parse(&contents) {
                return Ok(Self {
                    object_name: sidecar.filename,
                    expected_digest: Some(sidecar.digest),
                });
            }
            let stem = &arg[..arg.len() - SIDECAR_SUFFIX.len()];
            return Ok(Self {
                object_name: basename(stem)?,
                expected_digest: None,
            });
        }
        Ok(Self {
            object_name: basename(arg)?,
            expected_digest: None,
        })
    }
}

fn basename(arg: &str) -> KacResult<String> {
    object_basename(arg).ok_or_else(|| TransportError::InvalidName(arg.to_string()).into())
}
