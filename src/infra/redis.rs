use anyhow::{Context, Result};
use ::redis::AsyncCommands;
use ::redis::aio::MultiplexedConnection;
use tracing::debug;

use crate::secrets::ConnectionParams;
use crate::services::{KeyValueStore, KvConnector};

/// Opens a fresh Redis connection per call; nothing is pooled.
#[derive(Debug, Default, Clone, Copy)]
pub struct RedisConnector;

#[async_trait::async_trait]
impl KvConnector for RedisConnector {
    #[tracing::instrument(skip(self, params), fields(host = %params.host, port = params.port))]
    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn KeyValueStore>> {
        let info = ::redis::ConnectionInfo {
            addr: ::redis::ConnectionAddr::Tcp(params.host.clone(), params.port),
            redis: ::redis::RedisConnectionInfo {
                password: params.password.clone(),
                ..Default::default()
            },
        };

        let client = ::redis::Client::open(info).context("Invalid Redis connection parameters")?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .with_context(|| format!("Failed to connect to Redis at {}:{}", params.host, params.port))?;

        debug!("Connected to Redis");
        Ok(Box::new(RedisStore { conn }))
    }
}

/// A single Redis connection used for plain `GET`/`SET`.
pub struct RedisStore {
    conn: MultiplexedConnection,
}

#[async_trait::async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        let value: Option<Vec<u8>> = self
            .conn
            .get(key)
            .await
            .with_context(|| format!("Redis GET {key} failed"))?;
        Ok(value)
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let _: () = self
            .conn
            .set(key, value)
            .await
            .with_context(|| format!("Redis SET {key} failed"))?;
        Ok(())
    }
}
