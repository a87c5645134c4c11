//! HTML rendering through Jinja-style templates.
//!
//! Templates see the counters as a `planets_data` mapping and the render time
//! as `generated_at`, e.g. `{{ planets_data.num_planets_eu }}`.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use minijinja::{Environment, context};
use tracing::debug;

use crate::error::{Error, Result};
use crate::site::record::SiteDataRecord;

/// Turns a named template plus counter values into an HTML document.
pub trait SiteRenderer: Send + Sync {
    fn render(&self, template: &str, record: &SiteDataRecord) -> Result<String>;
}

/// [`SiteRenderer`] backed by a `minijinja` environment.
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    /// Loads templates lazily from files under `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(dir.as_ref().to_path_buf()));
        Self { env }
    }

    /// Builds a renderer holding a single in-memory template.
    pub fn from_source(name: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let mut env = Environment::new();
        env.add_template_owned(name.clone(), source.into())
            .map_err(|e| Error::RenderFailed {
                template: name,
                reason: e.to_string(),
            })?;
        Ok(Self { env })
    }
}

impl SiteRenderer for TemplateRenderer {
    fn render(&self, template: &str, record: &SiteDataRecord) -> Result<String> {
        let failed = |e: minijinja::Error| Error::RenderFailed {
            template: template.to_string(),
            reason: e.to_string(),
        };

        let tmpl = self.env.get_template(template).map_err(failed)?;
        let html = tmpl
            .render(context! {
                planets_data => record,
                generated_at => Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            })
            .map_err(failed)?;

        debug!(template, bytes = html.len(), "Rendered page");
        Ok(html)
    }
}
