//! In-memory stand-ins for every external service the site job talks to.
//!
//! Each fake counts its calls so tests can assert that later stages never ran.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use bytes::Bytes;
use planets_site::config::SiteConfig;
use planets_site::job::Clients;
use planets_site::secrets::ConnectionParams;
use planets_site::services::{
    CryptoKeyName, KeyManagementService, KeyValueStore, KvConnector, ObjectStore,
};
use planets_site::site::{SiteDataRecord, SiteRenderer, TemplateRenderer};

pub const SECRETS_JSON: &str =
    r#"{"redis": {"host": "10.0.0.3", "port": "6379", "password": "hunter2"}}"#;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
    pub fail_puts: AtomicBool,
}

impl MemoryObjectStore {
    pub fn insert(&self, bucket: &str, object: &str, body: impl Into<Bytes>) {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), object.to_string()),
            StoredObject {
                body: body.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    pub fn remove(&self, bucket: &str, object: &str) {
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), object.to_string()));
    }

    pub fn object(&self, bucket: &str, object: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), object.to_string()))
            .cloned()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: &str, object: &str) -> Result<Bytes> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.object(bucket, object)
            .map(|o| o.body)
            .ok_or_else(|| anyhow!("404 No such object: {bucket}/{object}"))
    }

    async fn put(&self, bucket: &str, object: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            bail!("403 Forbidden: {bucket}/{object}");
        }
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), object.to_string()),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

/// Fake envelope encryption: the ciphertext is the key name, a separator and
/// the plaintext XOR-ed with a fixed byte. [`SealingKms::seal`] is the paired
/// encryptor.
#[derive(Default)]
pub struct SealingKms {
    pub decrypts: AtomicUsize,
}

impl SealingKms {
    const MASK: u8 = 0x5a;

    pub fn seal(key: &CryptoKeyName, plaintext: &[u8]) -> Vec<u8> {
        let mut out = key.to_string().into_bytes();
        out.push(0);
        out.extend(plaintext.iter().map(|b| b ^ Self::MASK));
        out
    }
}

#[async_trait::async_trait]
impl KeyManagementService for SealingKms {
    async fn decrypt(&self, key: &CryptoKeyName, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);

        let split = ciphertext
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| anyhow!("400 Decryption failed: the ciphertext is invalid"))?;
        let (sealed_for, body) = ciphertext.split_at(split);
        if sealed_for != key.to_string().as_bytes() {
            bail!("400 Decryption failed: ciphertext was not sealed with {key}");
        }

        Ok(body[1..].iter().map(|b| b ^ Self::MASK).collect())
    }
}

/// Shared map standing in for Redis; every connection sees the same data.
#[derive(Default)]
pub struct MemoryKv {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub connects: AtomicUsize,
    pub sets: Arc<AtomicUsize>,
    pub fail_connect: AtomicBool,
    pub last_params: Mutex<Option<ConnectionParams>>,
}

impl MemoryKv {
    pub fn seed(&self, key: &str, value: &str) {
        self.seed_bytes(key, value.as_bytes());
    }

    pub fn seed_bytes(&self, key: &str, value: &[u8]) {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .unwrap()
            .get(key)
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }
}

#[async_trait::async_trait]
impl KvConnector for MemoryKv {
    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn KeyValueStore>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock().unwrap() = Some(params.clone());
        if self.fail_connect.load(Ordering::SeqCst) {
            bail!("Connection refused ({}:{})", params.host, params.port);
        }
        Ok(Box::new(MemoryKvConnection {
            data: self.data.clone(),
            sets: self.sets.clone(),
        }))
    }
}

struct MemoryKvConnection {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    sets: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryKvConnection {
    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.as_bytes().to_vec());
        Ok(())
    }
}

/// Wraps the shipped templates and counts renders.
pub struct CountingRenderer {
    inner: TemplateRenderer,
    pub renders: AtomicUsize,
}

impl CountingRenderer {
    pub fn shipped_templates() -> Self {
        Self {
            inner: TemplateRenderer::from_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/templates")),
            renders: AtomicUsize::new(0),
        }
    }
}

impl SiteRenderer for CountingRenderer {
    fn render(&self, template: &str, record: &SiteDataRecord) -> planets_site::Result<String> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.inner.render(template, record)
    }
}

/// A fully wired set of fakes with the secrets document already uploaded.
pub struct Harness {
    pub config: SiteConfig,
    pub storage: Arc<MemoryObjectStore>,
    pub kms: Arc<SealingKms>,
    pub kv: Arc<MemoryKv>,
    pub renderer: Arc<CountingRenderer>,
}

impl Harness {
    pub fn new() -> Self {
        let harness = Self {
            config: SiteConfig::default(),
            storage: Arc::new(MemoryObjectStore::default()),
            kms: Arc::new(SealingKms::default()),
            kv: Arc::new(MemoryKv::default()),
            renderer: Arc::new(CountingRenderer::shipped_templates()),
        };
        harness.upload_secrets(SECRETS_JSON.as_bytes());
        harness
    }

    pub fn with_counters(eu: &str, nasa: &str) -> Self {
        let harness = Self::new();
        harness.kv.seed("planets_data_eu", eu);
        harness.kv.seed("planets_data_nasa", nasa);
        harness
    }

    /// Seals `plaintext` under the configured key and stores it as the
    /// secrets object.
    pub fn upload_secrets(&self, plaintext: &[u8]) {
        let location = &self.config.secrets;
        self.storage.insert(
            &location.bucket,
            &location.object,
            SealingKms::seal(&location.key, plaintext),
        );
    }

    pub fn clients(&self) -> Clients {
        Clients {
            storage: self.storage.clone(),
            kms: self.kms.clone(),
            kv: self.kv.clone(),
            renderer: self.renderer.clone(),
        }
    }

    pub fn published_page(&self) -> Option<StoredObject> {
        self.storage
            .object(&self.config.site_bucket, &self.config.site_object)
    }
}
