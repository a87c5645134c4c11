//! Error type shared by every stage of a site invocation.
//!
//! Nothing is recovered locally: each variant aborts the current invocation
//! and surfaces to whatever triggered it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("object storage unavailable for {bucket}/{object}: {reason}")]
    StorageUnavailable {
        bucket: String,
        object: String,
        reason: String,
    },

    #[error("decryption failed under {key}: {reason}")]
    DecryptionFailed { key: String, reason: String },

    #[error("secrets document invalid: {0}")]
    SecretsFormatInvalid(String),

    #[error("key-value store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{key} value {value:?} is not a number: {source}")]
    NotANumber {
        key: String,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("new {key} is maybe {proposed}, current value is {current}")]
    ValueOutOfBounds {
        key: String,
        proposed: i64,
        current: i64,
    },

    #[error("render of template {template} failed: {reason}")]
    RenderFailed { template: String, reason: String },

    #[error("publish to {bucket}/{object} failed: {reason}")]
    PublishFailed {
        bucket: String,
        object: String,
        reason: String,
    },

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
