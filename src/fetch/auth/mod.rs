//! Authenticating [`HttpClient`](super::HttpClient) wrappers.

mod google;

pub use google::{GoogleAuth, TokenSource};
