pub mod config;
pub mod error;
pub mod types;

pub use error::{Denial, IntegrityError, KacError, KacResult, TransportError};
pub use types::{AuditReport, EncryptionHeader, EnvironmentSnapshot, SidecarHash};

/// Object-name suffix under which an object's header is stored next to it
pub const HEADER_SUFFIX: &str = ".hdr";

/// File-name suffix of a sidecar hash file
pub const SIDECAR_SUFFIX: &str = ".sha256";

/// Reduce a user-supplied object name to a bare file name.
///
/// Returns `None` for names that cannot address a single object
/// (empty, `.`, `..`).
pub fn object_basename(name: &str) -> Option<String> {
    let base = name
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("");
    match base {
        "" | "." | ".." => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_basename() {
        assert_eq!(object_basename("report.pdf").as_deref(), Some("report.pdf"));
        assert_eq!(object_basename("/tmp/x/report.pdf").as_deref(), Some("report.pdf"));
        assert_eq!(object_basename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(object_basename("dir/").as_deref(), Some("dir"));
        assert_eq!(object_basename(""), None);
        assert_eq!(object_basename(".."), None);
        assert_eq!(object_basename("a/.."), None);
    }
}
