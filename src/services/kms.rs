//! Trait and key naming for envelope decryption.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;

use crate::error::Error;

/// Four-part identifier of a managed encryption key.
///
/// Renders as the full resource name
/// `projects/{project}/locations/{location}/keyRings/{key_ring}/cryptoKeys/{key}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoKeyName {
    pub project: String,
    pub location: String,
    pub key_ring: String,
    pub key: String,
}

impl CryptoKeyName {
    pub fn new(
        project: impl Into<String>,
        location: impl Into<String>,
        key_ring: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            location: location.into(),
            key_ring: key_ring.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for CryptoKeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            self.project, self.location, self.key_ring, self.key
        )
    }
}

impl FromStr for CryptoKeyName {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();

        if parts.len() != 8
            || parts[0] != "projects"
            || parts[2] != "locations"
            || parts[4] != "keyRings"
            || parts[6] != "cryptoKeys"
            || parts.iter().any(|p| p.is_empty())
        {
            return Err(Error::Config(format!("invalid KMS key name: {s}")));
        }

        Ok(Self::new(parts[1], parts[3], parts[5], parts[7]))
    }
}

/// A key-management service able to decrypt ciphertext under a named key.
///
/// The service never exposes raw key material; there is no encrypt path here.
#[async_trait::async_trait]
pub trait KeyManagementService: Send + Sync {
    async fn decrypt(&self, key: &CryptoKeyName, ciphertext: &[u8]) -> Result<Vec<u8>>;
}
