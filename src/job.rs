//! One site invocation: secrets → counters → render → publish.

use std::sync::Arc;

use tracing::info;

use crate::config::{CounterSource, SiteConfig};
use crate::counter::{CounterUpdater, read_counter};
use crate::error::{Error, Result};
use crate::secrets::SecretStore;
use crate::services::{KeyManagementService, KvConnector, ObjectStore};
use crate::site::{PublishedPage, SiteDataRecord, SitePublisher, SiteRenderer};

/// The external clients a job is wired to.
#[derive(Clone)]
pub struct Clients {
    pub storage: Arc<dyn ObjectStore>,
    pub kms: Arc<dyn KeyManagementService>,
    pub kv: Arc<dyn KvConnector>,
    pub renderer: Arc<dyn SiteRenderer>,
}

impl Clients {
    pub fn secret_store(&self, config: &SiteConfig) -> SecretStore {
        SecretStore::new(
            self.storage.clone(),
            self.kms.clone(),
            config.secrets.clone(),
        )
    }

    pub fn counter_updater(&self, config: &SiteConfig) -> CounterUpdater {
        CounterUpdater::new(
            self.secret_store(config),
            self.kv.clone(),
            config.cache_service.clone(),
        )
    }
}

/// Rebuilds and publishes the counter page.
///
/// Holds no state between runs; every call re-fetches the secrets and opens
/// its own key-value connection.
pub struct SiteJob {
    secrets: SecretStore,
    kv: Arc<dyn KvConnector>,
    renderer: Arc<dyn SiteRenderer>,
    publisher: SitePublisher,
    cache_service: String,
    counters: Vec<CounterSource>,
    template: String,
}

impl SiteJob {
    pub fn new(config: &SiteConfig, clients: &Clients) -> Self {
        Self {
            secrets: clients.secret_store(config),
            kv: clients.kv.clone(),
            renderer: clients.renderer.clone(),
            publisher: SitePublisher::new(
                clients.storage.clone(),
                config.site_bucket.clone(),
                config.site_object.clone(),
            ),
            cache_service: config.cache_service.clone(),
            counters: config.counters.clone(),
            template: config.template.clone(),
        }
    }

    /// Reads the configured counters without modifying them.
    pub async fn read_counters(&self) -> Result<SiteDataRecord> {
        let secrets = self.secrets.fetch_secrets().await?;
        let params = secrets.service(&self.cache_service)?;

        let mut store = self
            .kv
            .connect(&params)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("{e:#}")))?;

        let mut record = SiteDataRecord::new();
        for counter in &self.counters {
            let value = read_counter(store.as_mut(), &counter.key).await?;
            info!(field = %counter.field, key = %counter.key, value, "Read counter");
            record.insert(counter.field.clone(), value);
        }

        Ok(record)
    }

    /// Runs one full invocation. Nothing is published unless every step
    /// before the upload succeeds.
    #[tracing::instrument(skip(self), fields(template = %self.template))]
    pub async fn run(&self) -> Result<PublishedPage> {
        let record = self.read_counters().await?;
        let html = self.renderer.render(&self.template, &record)?;
        self.publisher.publish(html).await
    }
}
