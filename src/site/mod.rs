//! Rendering and publishing the static counter page.

pub mod publish;
pub mod record;
pub mod render;

pub use publish::{PublishedPage, SitePublisher};
pub use record::SiteDataRecord;
pub use render::{SiteRenderer, TemplateRenderer};
