//! Fetching and decrypting the project secrets document.
//!
//! The encrypted document lives in object storage and is decrypted through
//! the key-management service on every call. Nothing is cached: decrypted
//! secrets exist only for the invocation that asked for them.
//!
//! Plaintext format:
//! ```json
//! {
//!   "redis": { "host": "10.0.0.3", "port": 6379, "password": "..." }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::services::{CryptoKeyName, KeyManagementService, ObjectStore};

/// Connection parameters for one service named in the secrets document.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionParams {
    pub host: String,
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// Ports show up both as numbers and as strings in deployed documents.
fn deserialize_port<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u16, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// The decrypted secrets document, keyed by service name.
///
/// Only the top-level shape is checked on parse; each service entry is
/// validated when it is looked up.
pub struct DecryptedSecrets {
    services: Map<String, Value>,
}

impl DecryptedSecrets {
    /// Parses a plaintext secrets document.
    pub fn from_json(plaintext: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(plaintext)
            .map_err(|e| Error::SecretsFormatInvalid(e.to_string()))?;

        match value {
            Value::Object(services) => Ok(Self { services }),
            other => Err(Error::SecretsFormatInvalid(format!(
                "expected a JSON object at the top level, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Returns the connection parameters stored under `name`.
    pub fn service(&self, name: &str) -> Result<ConnectionParams> {
        let entry = self
            .services
            .get(name)
            .ok_or_else(|| Error::SecretsFormatInvalid(format!("no entry for service '{name}'")))?;

        ConnectionParams::deserialize(entry)
            .map_err(|e| Error::SecretsFormatInvalid(format!("service '{name}': {e}")))
    }

    /// Iterates over the service names present in the document.
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}

impl fmt::Debug for DecryptedSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedSecrets")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Where the encrypted secrets document lives and which key seals it.
#[derive(Debug, Clone)]
pub struct SecretsLocation {
    pub bucket: String,
    pub object: String,
    pub key: CryptoKeyName,
}

/// Fetches and decrypts the secrets document on demand.
#[derive(Clone)]
pub struct SecretStore {
    storage: Arc<dyn ObjectStore>,
    kms: Arc<dyn KeyManagementService>,
    location: SecretsLocation,
}

impl SecretStore {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        kms: Arc<dyn KeyManagementService>,
        location: SecretsLocation,
    ) -> Self {
        Self {
            storage,
            kms,
            location,
        }
    }

    pub fn location(&self) -> &SecretsLocation {
        &self.location
    }

    /// Downloads the ciphertext, decrypts it and parses the plaintext.
    ///
    /// # Errors
    ///
    /// - [`Error::StorageUnavailable`] if the object cannot be read.
    /// - [`Error::DecryptionFailed`] if the key-management service rejects it.
    /// - [`Error::SecretsFormatInvalid`] if the plaintext is not a JSON object.
    #[tracing::instrument(
        skip(self),
        fields(bucket = %self.location.bucket, object = %self.location.object)
    )]
    pub async fn fetch_secrets(&self) -> Result<DecryptedSecrets> {
        let SecretsLocation { bucket, object, key } = &self.location;

        let ciphertext = self.storage.get(bucket, object).await.map_err(|e| {
            Error::StorageUnavailable {
                bucket: bucket.clone(),
                object: object.clone(),
                reason: format!("{e:#}"),
            }
        })?;
        debug!(ciphertext_len = ciphertext.len(), "Fetched encrypted secrets");

        let plaintext = self
            .kms
            .decrypt(key, &ciphertext)
            .await
            .map_err(|e| Error::DecryptionFailed {
                key: key.to_string(),
                reason: format!("{e:#}"),
            })?;
        debug!(plaintext_len = plaintext.len(), "Decrypted secrets");

        DecryptedSecrets::from_json(&plaintext)
    }
}
