//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kac_core::config::{StorageBackend, StorageConfig};
use kac_core::{EncryptionHeader, TransportError, HEADER_SUFFIX};
use kac_crypto::{ClassSet, Issuer, KeyAggregateEngine, KeyWrap, SystemParameters, WrapError};
use kac_device::{Feedback, PresenceGate, Presentation, TextViewer};
use kac_pipeline::{DecryptPipeline, EncryptPipeline};
use kac_storage::{BlobStore, OperatorStore, StoredObject};
use tempfile::TempDir;
use zeroize::Zeroizing;

pub fn issuer() -> Issuer {
    Issuer::new(SystemParameters::generate(
        ClassSet::new(["finance", "iot", "hr", "security"]).unwrap(),
    ))
}

pub fn memory_store() -> Arc<OperatorStore> {
    let cfg = StorageConfig {
        backend: StorageBackend::Memory,
        prefix: "kac".into(),
        ..Default::default()
    };
    Arc::new(OperatorStore::from_config(&cfg, None).expect("memory operator"))
}

pub fn write_test_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write test file");
    path
}

/// Key wrap that records every call in order.
pub struct RecordingWrap {
    inner: KeyAggregateEngine,
    calls: Mutex<Vec<String>>,
}

impl RecordingWrap {
    pub fn issue(issuer: &Issuer, device: &str, classes: &[&str]) -> Arc<Self> {
        let key = issuer
            .issue(device, &ClassSet::new(classes.iter().copied()).unwrap())
            .unwrap();
        Arc::new(Self {
            inner: KeyAggregateEngine::new(key),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl KeyWrap for RecordingWrap {
    fn authorized(&self, class: &str) -> bool {
        self.record(format!("authorized:{class}"));
        self.inner.authorized(class)
    }

    fn wrap(&self, content_key: &[u8]) -> Result<String, WrapError> {
        self.record("wrap".into());
        self.inner.wrap(content_key)
    }

    fn unwrap(&self, wrapped_hex: &str) -> Result<Zeroizing<Vec<u8>>, WrapError> {
        self.record("unwrap".into());
        self.inner.unwrap(wrapped_hex)
    }
}

/// Gate that always resolves to the same presentation.
pub struct StaticGate {
    presentation: Presentation,
    pub waits: AtomicUsize,
}

impl StaticGate {
    pub fn granting(principal: &str) -> Arc<Self> {
        Arc::new(Self {
            presentation: Presentation::granted(principal),
            waits: AtomicUsize::new(0),
        })
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            presentation: Presentation::unknown(),
            waits: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PresenceGate for StaticGate {
    async fn wait_for_presentation(&self) -> anyhow::Result<Presentation> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        Ok(self.presentation.clone())
    }
}

/// Gate nobody ever taps.
pub struct HangingGate;

#[async_trait]
impl PresenceGate for HangingGate {
    async fn wait_for_presentation(&self) -> anyhow::Result<Presentation> {
        std::future::pending().await
    }
}

/// Gate whose reader is broken.
pub struct BrokenGate;

#[async_trait]
impl PresenceGate for BrokenGate {
    async fn wait_for_presentation(&self) -> anyhow::Result<Presentation> {
        anyhow::bail!("reader not connected")
    }
}

#[derive(Default)]
pub struct RecordingFeedback {
    events: Mutex<Vec<(bool, Vec<String>)>>,
}

impl RecordingFeedback {
    pub fn events(&self) -> Vec<(bool, Vec<String>)> {
        self.events.lock().unwrap().clone()
    }

    pub fn last(&self) -> (bool, Vec<String>) {
        self.events().last().cloned().expect("no feedback recorded")
    }
}

impl Feedback for RecordingFeedback {
    fn present(&self, granted: bool, lines: &[String]) {
        self.events.lock().unwrap().push((granted, lines.to_vec()));
    }
}

#[derive(Default)]
pub struct RecordingViewer {
    pub shown: Mutex<Vec<(String, String)>>,
}

impl TextViewer for RecordingViewer {
    fn view(&self, title: &str, text: &str) -> anyhow::Result<()> {
        self.shown
            .lock()
            .unwrap()
            .push((title.to_string(), text.to_string()));
        Ok(())
    }
}

/// Store wrapper that counts calls and remembers the last attestation.
pub struct CountingStore {
    inner: Arc<dyn BlobStore>,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
    pub last_attestation: Mutex<Option<Vec<u8>>>,
    fail_puts: bool,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn BlobStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            last_attestation: Mutex::new(None),
            fail_puts: false,
        })
    }

    pub fn rejecting_uploads(inner: Arc<dyn BlobStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            last_attestation: Mutex::new(None),
            fail_puts: true,
        })
    }
}

#[async_trait]
impl BlobStore for CountingStore {
    async fn put(
        &self,
        name: &str,
        ciphertext: Vec<u8>,
        header_json: String,
    ) -> Result<(), TransportError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts {
            return Err(TransportError::Status { status: 503 });
        }
        self.inner.put(name, ciphertext, header_json).await
    }

    async fn get(
        &self,
        name: &str,
        attestation: Option<&[u8]>,
    ) -> Result<StoredObject, TransportError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        *self.last_attestation.lock().unwrap() = attestation.map(<[u8]>::to_vec);
        self.inner.get(name, attestation).await
    }

    async fn probe(&self) -> Result<(), TransportError> {
        self.inner.probe().await
    }

    fn endpoint(&self) -> String {
        self.inner.endpoint()
    }
}

/// One device's view of the world: its key, outputs, and recorders.
pub struct Device {
    pub name: String,
    pub engine: Arc<RecordingWrap>,
    pub feedback: Arc<RecordingFeedback>,
    pub dir: TempDir,
}

impl Device {
    pub fn new(issuer: &Issuer, name: &str, classes: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            engine: RecordingWrap::issue(issuer, name, classes),
            feedback: Arc::new(RecordingFeedback::default()),
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn encryptor(&self, store: Arc<dyn BlobStore>) -> EncryptPipeline {
        EncryptPipeline::new(self.engine.clone(), store)
            .with_feedback(self.feedback.clone())
            .with_output(self.dir.path(), self.dir.path())
    }

    pub fn decryptor(&self, gate: Arc<dyn PresenceGate>, store: Arc<dyn BlobStore>) -> DecryptPipeline {
        DecryptPipeline::new(gate, store, self.engine.clone())
            .with_feedback(self.feedback.clone())
            .with_output_dir(self.dir.path())
            .with_gate_timeout(Duration::from_secs(5))
    }

    pub fn output(&self, object_name: &str) -> PathBuf {
        self.dir.path().join(format!("dec_{object_name}"))
    }
}

/// Object path inside [`memory_store`].
pub fn object_path(name: &str) -> String {
    format!("kac/{name}")
}

pub async fn read_header(store: &OperatorStore, name: &str) -> EncryptionHeader {
    let raw = store
        .operator()
        .read(&format!("{}{HEADER_SUFFIX}", object_path(name)))
        .await
        .unwrap()
        .to_vec();
    EncryptionHeader::from_json(std::str::from_utf8(&raw).unwrap()).unwrap()
}

pub async fn write_header(store: &OperatorStore, name: &str, header: &EncryptionHeader) {
    write_raw_header(store, name, &header.to_json().unwrap()).await;
}

pub async fn write_raw_header(store: &OperatorStore, name: &str, raw: &str) {
    store
        .operator()
        .write(&format!("{}{HEADER_SUFFIX}", object_path(name)), raw.to_string())
        .await
        .unwrap();
}

pub async fn read_ciphertext(store: &OperatorStore, name: &str) -> Vec<u8> {
    store.operator().read(&object_path(name)).await.unwrap().to_vec()
}

pub async fn write_ciphertext(store: &OperatorStore, name: &str, ciphertext: Vec<u8>) {
    store
        .operator()
        .write(&object_path(name), ciphertext)
        .await
        .unwrap();
}
