//! Interfaces to the managed services a site invocation talks to.
//!
//! Every collaborator is injected as one of these traits so the job can run
//! against Google Cloud, AWS, or in-memory fakes without code changes.

pub mod kms;
pub mod kv_store;
pub mod object_store;

pub use kms::{CryptoKeyName, KeyManagementService};
pub use kv_store::{KeyValueStore, KvConnector};
pub use object_store::ObjectStore;
