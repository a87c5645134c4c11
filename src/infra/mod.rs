//! Concrete implementations of the [`services`](crate::services) traits.
//!
//! [`gcp`] talks to Cloud Storage and Cloud KMS, [`s3`] stores objects in
//! Amazon S3, and [`redis`] opens key-value connections.

pub mod gcp;
pub mod redis;
pub mod s3;
