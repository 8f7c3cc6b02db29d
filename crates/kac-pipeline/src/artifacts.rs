//! Local artifacts: audit reports, sidecars, recovered plaintext

use std::path::{Path, PathBuf};

use kac_core::{AuditReport, KacError, KacResult, SidecarHash, SIDECAR_SUFFIX};

pub fn report_path(dir: &Path, object_name: &str) -> PathBuf {
    dir.join(format!("enc_report_{object_name}.json"))
}

pub fn sidecar_path(dir: &Path, object_name: &str) -> PathBuf {
    dir.join(format!("{object_name}{SIDECAR_SUFFIX}"))
}

pub fn plaintext_path(dir: &Path, object_name: &str) -> PathBuf {
    dir.join(format!("dec_{object_name}"))
}

/// Write a fresh report; each encryption gets its own file.
pub async fn write_report(path: &Path, report: &AuditReport) -> KacResult<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| anyhow::anyhow!("serializing audit report: {e}"))?;
    write_file(path, json.as_bytes()).await
}

pub async fn write_sidecar(path: &Path, sidecar: &SidecarHash) -> KacResult<()> {
    write_file(path, sidecar.render().as_bytes()).await
}

pub async fn write_file(path: &Path, contents: &[u8]) -> KacResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| KacError::file(parent, e))?;
        }
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| KacError::file(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        let dir = Path::new("/out");
        assert_eq!(
            report_path(dir, "a.txt"),
            PathBuf::from("/out/enc_report_a.txt.json")
        );
        assert_eq!(sidecar_path(dir, "a.txt"), PathBuf::from("/out/a.txt.sha256"));
        assert_eq!(plaintext_path(dir, "a.txt"), PathBuf::from("/out/dec_a.txt"));
    }

    #[tokio::test]
    async fn test_sidecar_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = sidecar_path(dir.path(), "a.txt");
        write_sidecar(&path, &SidecarHash::new("ab12", "a.txt"))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ab12  a.txt\n");
    }

    #[tokio::test]
    async fn test_write_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/file.bin");
        write_file(&path, b"x").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"x");
    }
}
