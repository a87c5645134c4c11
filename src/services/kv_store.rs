//! Trait for the text key-value store holding the counters.

use anyhow::Result;

use crate::secrets::ConnectionParams;

/// An open connection to a key-value store. Values are written as text but
/// read back as raw bytes, since nothing stops another writer storing binary.
#[async_trait::async_trait]
pub trait KeyValueStore: Send {
    /// Returns the value under `key`, or `None` if the key was never written.
    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Opens [`KeyValueStore`] connections from decrypted connection parameters.
#[async_trait::async_trait]
pub trait KvConnector: Send + Sync {
    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn KeyValueStore>>;
}
