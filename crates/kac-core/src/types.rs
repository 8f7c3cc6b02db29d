use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::object_basename;

/// Ambient readings captured at encryption time, embedded as header metadata
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    #[serde(rename = "temp_c")]
    pub temperature: f64,
    #[serde(rename = "humidity_pct")]
    pub humidity: f64,
    #[serde(rename = "pressure_hpa")]
    pub pressure: f64,
}

impl EnvironmentSnapshot {
    /// Build a snapshot from raw sensor values, rounded to header precision
    /// (temperature to 0.01, humidity and pressure to 0.1).
    pub fn from_reading(temperature: f64, humidity: f64, pressure: f64) -> Self {
        Self {
            temperature: round_to(temperature, 100.0),
            humidity: round_to(humidity, 10.0),
            pressure: round_to(pressure, 10.0),
        }
    }

    /// Two short status lines for an operator display.
    pub fn status_lines(&self) -> Vec<String> {
        vec![
            format!("T {:.1}°C  H {:.0}%", self.temperature, self.humidity),
            format!("P {:.0} hPa", self.pressure),
        ]
    }
}

fn round_to(value: f64, scale: f64) -> f64 {
    (value * scale).round() / scale
}

/// Header that travels beside the ciphertext. Never contains plaintext.
///
/// Wire format (JSON, all binary fields hex):
/// `{class, nonce, tag, wrap, pt_sha256, ct_sha256, env}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptionHeader {
    pub class: String,
    /// 12-byte AES-GCM nonce
    pub nonce: String,
    /// 16-byte AES-GCM authentication tag
    #[serde(rename = "tag")]
    pub auth_tag: String,
    /// Content key wrapped under the producing device's aggregate key
    #[serde(rename = "wrap")]
    pub wrapped_key: String,
    #[serde(rename = "pt_sha256", default)]
    pub plaintext_sha256: Option<String>,
    #[serde(rename = "ct_sha256", default)]
    pub ciphertext_sha256: Option<String>,
    #[serde(rename = "env", default)]
    pub environment: Option<EnvironmentSnapshot>,
}

impl EncryptionHeader {
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).map_err(|e| anyhow::anyhow!("header serialization: {e}"))
    }

    /// Parse a header received from storage.
    pub fn from_json(raw: &str) -> Result<Self, TransportError> {
        serde_json::from_str(raw).map_err(|e| TransportError::InvalidHeader(e.to_string()))
    }

    pub fn nonce_bytes<const N: usize>(&self) -> anyhow::Result<[u8; N]> {
        decode_fixed("nonce", &self.nonce)
    }

    pub fn tag_bytes<const N: usize>(&self) -> anyhow::Result<[u8; N]> {
        decode_fixed("tag", &self.auth_tag)
    }
}

fn decode_fixed<const N: usize>(field: &str, value: &str) -> anyhow::Result<[u8; N]> {
    let mut out = [0u8; N];
    hex::decode_to_slice(value, &mut out)
        .map_err(|e| anyhow::anyhow!("header field '{field}': {e} (expected {N} hex-encoded bytes)"))?;
    Ok(out)
}

/// Local, device-side record of one successful encryption. Never uploaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub timestamp: String,
    pub file: String,
    pub size_bytes: u64,
    pub class: String,
    pub plaintext_sha256: String,
    pub ciphertext_sha256: String,
    pub nonce_hex: String,
    pub tag_hex: String,
    pub wrapped_key_hex: String,
    pub storage_endpoint: String,
    pub env: Option<EnvironmentSnapshot>,
}

/// `<hex digest>  <filename>` pair written beside an encrypted object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarHash {
    pub digest: String,
    pub filename: String,
}

impl SidecarHash {
    pub fn new(digest: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            digest: digest.into(),
            filename: filename.into(),
        }
    }

    /// Parse sidecar contents: the first non-empty line with at least two
    /// whitespace-separated fields. The digest is lower-cased and the file
    /// name reduced to its basename.
    pub fn parse(contents: &str) -> Option<Self> {
        contents.lines().find_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 2 {
                return None;
            }
            let filename = object_basename(parts[parts.len() - 1])?;
            Some(Self {
                digest: parts[0].to_ascii_lowercase(),
                filename,
            })
        })
    }

    pub fn render(&self) -> String {
        format!("{}  {}\n", self.digest, self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> EncryptionHeader {
        EncryptionHeader {
            class: "finance".into(),
            nonce: "00".repeat(12),
            auth_tag: "11".repeat(16),
            wrapped_key: "22".repeat(32),
            plaintext_sha256: Some("ab".repeat(32)),
            ciphertext_sha256: Some("cd".repeat(32)),
            environment: None,
        }
    }

    #[test]
    fn test_header_wire_field_names() {
        let json = sample_header().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        for key in ["class", "nonce", "tag", "wrap", "pt_sha256", "ct_sha256", "env"] {
            assert!(value.get(key).is_some(), "missing wire field {key}");
        }
        assert!(value["env"].is_null());
    }

    #[test]
    fn test_header_without_digests_parses() {
        let raw = r#"{"class":"hr","nonce":"00","tag":"11","wrap":"22"}"#;
        let header = EncryptionHeader::from_json(raw).unwrap();
        assert_eq!(header.class, "hr");
        assert!(header.plaintext_sha256.is_none());
        assert!(header.environment.is_none());
    }

    #[test]
    fn test_header_garbage_is_invalid_header() {
        let err = EncryptionHeader::from_json("not json").unwrap_err();
        assert!(matches!(err, TransportError::InvalidHeader(_)));
    }

    #[test]
    fn test_header_fixed_fields() {
        let header = sample_header();
        assert_eq!(header.nonce_bytes::<12>().unwrap(), [0u8; 12]);
        assert_eq!(header.tag_bytes::<16>().unwrap(), [0x11u8; 16]);
        assert!(header.nonce_bytes::<16>().is_err(), "length must match exactly");
    }

    #[test]
    fn test_environment_rounding_and_wire_names() {
        let env = EnvironmentSnapshot::from_reading(21.4567, 40.44, 1013.26);
        assert_eq!(env.temperature, 21.46);
        assert_eq!(env.humidity, 40.4);
        assert_eq!(env.pressure, 1013.3);

        let value = serde_json::to_value(env).unwrap();
        assert_eq!(value["temp_c"], 21.46);
        assert_eq!(value["humidity_pct"], 40.4);
        assert_eq!(value["pressure_hpa"], 1013.3);
    }

    #[test]
    fn test_sidecar_render_parse() {
        let sidecar = SidecarHash::new("ab".repeat(32), "q3.xlsx");
        let text = sidecar.render();
        assert_eq!(text, format!("{}  q3.xlsx\n", "ab".repeat(32)));
        assert_eq!(SidecarHash::parse(&text), Some(sidecar));
    }

    #[test]
    fn test_sidecar_parse_skips_blank_and_normalizes() {
        let text = "\n   \nABCDEF  /home/alice/q3.xlsx\nffff other\n";
        let parsed = SidecarHash::parse(text).unwrap();
        assert_eq!(parsed.digest, "abcdef");
        assert_eq!(parsed.filename, "q3.xlsx");
    }

    #[test]
    fn test_sidecar_parse_without_filename() {
        assert_eq!(SidecarHash::parse("abcdef\n"), None);
        assert_eq!(SidecarHash::parse(""), None);
    }
}
