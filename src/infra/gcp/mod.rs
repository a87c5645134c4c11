//! Google Cloud clients over the REST APIs.

mod kms;
mod storage;

pub use kms::CloudKms;
pub use storage::GcsStore;
