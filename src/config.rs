//! Process-wide configuration for the site job.
//!
//! Every fixed location the job touches is collected here and handed to each
//! component at construction. [`SiteConfig::default`] matches the deployed
//! site.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::secrets::SecretsLocation;
use crate::services::CryptoKeyName;

pub const DEFAULT_SECRETS_BUCKET: &str = "dotufp-sm";
pub const DEFAULT_SECRETS_OBJECT: &str = "vaqmr-secrets.v3.json.encrypted";
pub const DEFAULT_KMS_KEY: &str = "projects/secret-manager-258521/locations/global/keyRings/dotufp-secrets/cryptoKeys/dotufp-secrets-key";
pub const DEFAULT_CACHE_SERVICE: &str = "redis";
pub const DEFAULT_SITE_BUCKET: &str = "www.howmanyplanetsarethere.com";
pub const DEFAULT_SITE_OBJECT: &str = "index.html";
pub const DEFAULT_TEMPLATE_DIR: &str = "templates";
pub const DEFAULT_TEMPLATE: &str = "template.html";
pub const DEFAULT_COUNTERS: [&str; 2] = [
    "num_planets_eu=planets_data_eu",
    "num_planets_nasa=planets_data_nasa",
];

/// Maps a template field to the key-value store key it is read from.
///
/// Written on the command line as `field=key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSource {
    pub field: String,
    pub key: String,
}

impl CounterSource {
    pub fn new(field: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            key: key.into(),
        }
    }
}

impl FromStr for CounterSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('=') {
            Some((field, key)) if !field.trim().is_empty() && !key.trim().is_empty() => {
                Ok(Self::new(field.trim(), key.trim()))
            }
            _ => Err(Error::Config(format!(
                "counter must be written as field=key, got '{s}'"
            ))),
        }
    }
}

impl fmt::Display for CounterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field, self.key)
    }
}

#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub secrets: SecretsLocation,
    /// Name of the secrets entry holding key-value store credentials.
    pub cache_service: String,
    pub site_bucket: String,
    pub site_object: String,
    pub template_dir: PathBuf,
    pub template: String,
    pub counters: Vec<CounterSource>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let counters = DEFAULT_COUNTERS
            .iter()
            .filter_map(|c| c.parse().ok())
            .collect();

        Self {
            secrets: SecretsLocation {
                bucket: DEFAULT_SECRETS_BUCKET.to_string(),
                object: DEFAULT_SECRETS_OBJECT.to_string(),
                key: CryptoKeyName::new(
                    "secret-manager-258521",
                    "global",
                    "dotufp-secrets",
                    "dotufp-secrets-key",
                ),
            },
            cache_service: DEFAULT_CACHE_SERVICE.to_string(),
            site_bucket: DEFAULT_SITE_BUCKET.to_string(),
            site_object: DEFAULT_SITE_OBJECT.to_string(),
            template_dir: PathBuf::from(DEFAULT_TEMPLATE_DIR),
            template: DEFAULT_TEMPLATE.to_string(),
            counters,
        }
    }
}

impl SiteConfig {
    /// Checks that every location is named and counter fields are unique.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("secrets bucket", &self.secrets.bucket),
            ("secrets object", &self.secrets.object),
            ("cache service", &self.cache_service),
            ("site bucket", &self.site_bucket),
            ("site object", &self.site_object),
            ("template", &self.template),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{name} must not be empty")));
            }
        }

        if self.counters.is_empty() {
            return Err(Error::Config("at least one counter is required".into()));
        }

        for (i, counter) in self.counters.iter().enumerate() {
            if self.counters[..i].iter().any(|c| c.field == counter.field) {
                return Err(Error::Config(format!(
                    "counter field '{}' is listed twice",
                    counter.field
                )));
            }
        }

        Ok(())
    }
}
