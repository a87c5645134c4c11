//! Publishes the planet-count page.
//!
//! A Pub/Sub push (or a direct `publish` run) reads the configured counters
//! from Redis, renders them into the site template and uploads the page to
//! object storage. The Redis credentials come from a KMS-encrypted secrets
//! document fetched fresh on every run.

pub mod config;
pub mod counter;
pub mod error;
pub mod fetch;
pub mod infra;
pub mod job;
pub mod secrets;
pub mod services;
pub mod site;
pub mod trigger;

pub use error::{Error, Result};
