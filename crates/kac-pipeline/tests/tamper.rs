//! Stored objects that were modified after upload must never decrypt

mod common;

use common::*;
use kac_core::{IntegrityError, KacError, SidecarHash, TransportError};
use kac_crypto::sha256_hex;
use kac_storage::OperatorStore;

const PAYROLL: &[u8] = b"employee,salary\nalice,100\nbob,90\n";

struct Stored {
    device: Device,
    store: std::sync::Arc<OperatorStore>,
}

async fn stored_payroll() -> Stored {
    let issuer = issuer();
    let store = memory_store();
    let device = Device::new(&issuer, "alice", &["finance"]);
    let input = write_test_file(device.dir.path(), "payroll.csv", PAYROLL);
    device
        .encryptor(store.clone())
        .encrypt(&input, "finance")
        .await
        .unwrap();
    Stored {
        device,
        store,
    }
}

impl Stored {
    async fn decrypt(&self, arg: &str) -> Result<(), KacError> {
        self.device
            .decryptor(StaticGate::granting("Alice"), self.store.clone())
            .decrypt(arg)
            .await
            .map(|_| ())
    }
}

fn flip_hex_bit(hex_str: &str, bit: usize) -> String {
    let mut bytes = hex::decode(hex_str).unwrap();
    bytes[bit / 8] ^= 1 << (bit % 8);
    hex::encode(bytes)
}

fn assert_decryption_failure(result: Result<(), KacError>, what: &str) {
    assert!(
        matches!(
            result,
            Err(KacError::Integrity(IntegrityError::Decryption(_)))
        ),
        "{what}: {result:?}"
    );
}

#[tokio::test]
async fn test_ciphertext_bit_flips() {
    let s = stored_payroll().await;
    let original = read_ciphertext(&s.store, "payroll.csv").await;

    for bit in [0, 7, 8 * original.len() / 2, 8 * original.len() - 1] {
        let mut tampered = original.clone();
        tampered[bit / 8] ^= 1 << (bit % 8);
        write_ciphertext(&s.store, "payroll.csv", tampered).await;
        assert_decryption_failure(s.decrypt("payroll.csv").await, &format!("ciphertext bit {bit}"));
    }
    assert!(!s.device.output("payroll.csv").exists());

    write_ciphertext(&s.store, "payroll.csv", original).await;
    s.decrypt("payroll.csv").await.unwrap();
}

#[tokio::test]
async fn test_header_field_bit_flips() {
    let s = stored_payroll().await;
    let original = read_header(&s.store, "payroll.csv").await;

    for bit in [0, 95] {
        let mut header = original.clone();
        header.nonce = flip_hex_bit(&header.nonce, bit);
        write_header(&s.store, "payroll.csv", &header).await;
        assert_decryption_failure(s.decrypt("payroll.csv").await, &format!("nonce bit {bit}"));
    }

    for bit in [0, 127] {
        let mut header = original.clone();
        header.auth_tag = flip_hex_bit(&header.auth_tag, bit);
        write_header(&s.store, "payroll.csv", &header).await;
        assert_decryption_failure(s.decrypt("payroll.csv").await, &format!("tag bit {bit}"));
    }

    for bit in [0, 255] {
        let mut header = original.clone();
        header.wrapped_key = flip_hex_bit(&header.wrapped_key, bit);
        write_header(&s.store, "payroll.csv", &header).await;
        assert_decryption_failure(s.decrypt("payroll.csv").await, &format!("wrap bit {bit}"));
    }

    assert_eq!(
        s.device.feedback.last(),
        (false, vec!["Decrypt error".to_string()])
    );
}

#[tokio::test]
async fn test_malformed_header_fields() {
    let s = stored_payroll().await;
    let original = read_header(&s.store, "payroll.csv").await;

    let mut short_nonce = original.clone();
    short_nonce.nonce.truncate(20);
    write_header(&s.store, "payroll.csv", &short_nonce).await;
    assert_decryption_failure(s.decrypt("payroll.csv").await, "short nonce");

    let mut bad_wrap = original.clone();
    bad_wrap.wrapped_key = "zz".repeat(32);
    write_header(&s.store, "payroll.csv", &bad_wrap).await;
    assert_decryption_failure(s.decrypt("payroll.csv").await, "non-hex wrap");
}

#[tokio::test]
async fn test_unparseable_header() {
    let s = stored_payroll().await;
    write_raw_header(&s.store, "payroll.csv", "{\"class\": \"finance\"").await;

    let err = s.decrypt("payroll.csv").await.unwrap_err();
    assert!(matches!(
        err,
        KacError::Transport(TransportError::InvalidHeader(_))
    ));
    assert_eq!(
        s.device.feedback.last(),
        (false, vec!["Header invalid".to_string()])
    );
}

#[tokio::test]
async fn test_header_digest_mismatch() {
    let s = stored_payroll().await;
    let mut header = read_header(&s.store, "payroll.csv").await;
    let forged = sha256_hex(b"something else");
    header.plaintext_sha256 = Some(forged.clone());
    write_header(&s.store, "payroll.csv", &header).await;

    let err = s.decrypt("payroll.csv").await.unwrap_err();
    match err {
        KacError::Integrity(IntegrityError::HeaderDigest { expected, actual }) => {
            assert_eq!(expected, forged);
            assert_eq!(actual, sha256_hex(PAYROLL));
        }
        other => panic!("expected HeaderDigest, got {other:?}"),
    }
    assert!(!s.device.output("payroll.csv").exists());
    assert_eq!(
        s.device.feedback.last(),
        (false, vec!["Hash mismatch".to_string(), "header".to_string()])
    );
}

#[tokio::test]
async fn test_header_without_digest_still_decrypts() {
    let s = stored_payroll().await;
    let mut header = read_header(&s.store, "payroll.csv").await;
    header.plaintext_sha256 = None;
    write_header(&s.store, "payroll.csv", &header).await;

    s.decrypt("payroll.csv").await.unwrap();
    assert_eq!(
        std::fs::read(s.device.output("payroll.csv")).unwrap(),
        PAYROLL
    );
}

#[tokio::test]
async fn test_sidecar_digest_mismatch() {
    let s = stored_payroll().await;
    let sidecar = s.device.dir.path().join("stale.sha256");
    std::fs::write(
        &sidecar,
        SidecarHash::new(sha256_hex(b"old payroll"), "payroll.csv").render(),
    )
    .unwrap();

    let err = s.decrypt(sidecar.to_str().unwrap()).await.unwrap_err();
    assert!(matches!(
        err,
        KacError::Integrity(IntegrityError::SidecarDigest { .. })
    ));
    assert!(!s.device.output("payroll.csv").exists());
    assert_eq!(
        s.device.feedback.last(),
        (false, vec!["Hash mismatch".to_string(), ".sha256".to_string()])
    );
}
