//! CLI entry point for the planet-count site job.
//!
//! Provides subcommands for serving the Pub/Sub push endpoint, running a
//! single publish, and applying a guarded counter update.

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use planets_site::config::{self, CounterSource, SiteConfig};
use planets_site::fetch::BasicClient;
use planets_site::fetch::auth::{GoogleAuth, TokenSource};
use planets_site::infra::gcp::{CloudKms, GcsStore};
use planets_site::infra::redis::RedisConnector;
use planets_site::infra::s3::S3Store;
use planets_site::job::{Clients, SiteJob};
use planets_site::secrets::SecretsLocation;
use planets_site::services::{CryptoKeyName, ObjectStore};
use planets_site::site::TemplateRenderer;
use std::ffi::OsStr;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "planets_site")]
#[command(about = "Publishes the planet-count site from Redis counters", long_about = None)]
struct Cli {
    #[command(flatten)]
    site: SiteArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SiteArgs {
    /// Bucket holding the encrypted secrets document
    #[arg(long, env = "SECRETS_BUCKET", default_value = config::DEFAULT_SECRETS_BUCKET, global = true)]
    secrets_bucket: String,

    /// Object name of the encrypted secrets document
    #[arg(long, env = "SECRETS_OBJECT", default_value = config::DEFAULT_SECRETS_OBJECT, global = true)]
    secrets_object: String,

    /// Full KMS key name (projects/*/locations/*/keyRings/*/cryptoKeys/*)
    #[arg(long, env = "KMS_KEY", default_value = config::DEFAULT_KMS_KEY, global = true)]
    kms_key: CryptoKeyName,

    /// Secrets entry holding the Redis connection parameters
    #[arg(long, env = "CACHE_SERVICE", default_value = config::DEFAULT_CACHE_SERVICE, global = true)]
    cache_service: String,

    /// Bucket the rendered page is published to
    #[arg(long, env = "SITE_BUCKET", default_value = config::DEFAULT_SITE_BUCKET, global = true)]
    site_bucket: String,

    /// Object name of the rendered page
    #[arg(long, env = "SITE_OBJECT", default_value = config::DEFAULT_SITE_OBJECT, global = true)]
    site_object: String,

    /// Directory containing page templates
    #[arg(long, env = "TEMPLATE_DIR", default_value = config::DEFAULT_TEMPLATE_DIR, global = true)]
    template_dir: PathBuf,

    /// Template rendered into the page
    #[arg(long = "template", env = "TEMPLATE_NAME", default_value = config::DEFAULT_TEMPLATE, global = true)]
    template: String,

    /// Counter to publish, as template_field=redis_key (repeatable)
    #[arg(
        long = "counter",
        env = "COUNTERS",
        value_delimiter = ',',
        default_values = config::DEFAULT_COUNTERS,
        global = true
    )]
    counters: Vec<CounterSource>,

    /// Object storage backend for both the secrets and the page
    #[arg(long, env = "STORAGE_BACKEND", value_enum, default_value_t = StorageBackend::Gcs, global = true)]
    storage: StorageBackend,
}

impl SiteArgs {
    fn into_config(self) -> SiteConfig {
        SiteConfig {
            secrets: SecretsLocation {
                bucket: self.secrets_bucket,
                object: self.secrets_object,
                key: self.kms_key,
            },
            cache_service: self.cache_service,
            site_bucket: self.site_bucket,
            site_object: self.site_object,
            template_dir: self.template_dir,
            template: self.template,
            counters: self.counters,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StorageBackend {
    /// Google Cloud Storage
    Gcs,
    /// Amazon S3
    S3,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the Pub/Sub push endpoint; every push republishes the page
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value_t = 8080)]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: std::net::IpAddr,
    },
    /// Read the counters, render the page and publish it once
    Publish,
    /// Set a counter if the new value is within 10% above the current one
    UpdateCounter {
        /// Redis key of the counter
        key: String,

        /// Proposed new value
        value: String,
    },
    /// Print the resolved configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_tracing()?;

    let cli = Cli::parse();
    let storage_backend = cli.site.storage;
    let config = cli.site.into_config();
    config.validate()?;

    match cli.command {
        Commands::ShowConfig => {
            show_config(&config, storage_backend);
        }
        Commands::Publish => {
            let clients = build_clients(&config, storage_backend).await?;
            let page = SiteJob::new(&config, &clients).run().await?;
            info!(bucket = %page.bucket, object = %page.object, bytes = page.bytes, "Site published");
        }
        Commands::UpdateCounter { key, value } => {
            let clients = build_clients(&config, storage_backend).await?;
            clients
                .counter_updater(&config)
                .update_counter(&key, &value)
                .await?;
        }
        Commands::Serve { port, host } => {
            let clients = build_clients(&config, storage_backend).await?;
            let job = Arc::new(SiteJob::new(&config, &clients));
            planets_site::trigger::serve(job, SocketAddr::new(host, port)).await?;
        }
    }

    Ok(())
}

/// Logging setup: colored stderr, plus a JSON rolling log file when
/// `LOG_FILE_PATH` is set.
fn init_tracing() -> Result<Option<WorkerGuard>> {
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let (json_layer, guard) = match std::env::var("LOG_FILE_PATH") {
        Ok(log_file_path) => {
            let log_dir = Path::new(&log_file_path)
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("logs"));
            let log_file_name = Path::new(&log_file_path)
                .file_name()
                .unwrap_or(OsStr::new("planets_site.log"));

            let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(non_blocking_file)
                .with_filter(
                    EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?),
                );
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(guard)
}

/// Builds the production clients for `backend`.
///
/// Google credentials come from `GOOGLE_OAUTH_ACCESS_TOKEN` when set,
/// otherwise from the metadata server of the runtime's service account.
async fn build_clients(config: &SiteConfig, backend: StorageBackend) -> Result<Clients> {
    let token_source = match std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
        Ok(token) if !token.trim().is_empty() => TokenSource::Static(token.trim().to_string()),
        _ => TokenSource::Metadata,
    };

    let storage: Arc<dyn ObjectStore> = match backend {
        StorageBackend::Gcs => {
            let client = GoogleAuth::new(BasicClient::new()?, token_source.clone());
            match std::env::var("STORAGE_EMULATOR_HOST") {
                Ok(endpoint) => {
                    info!(endpoint = %endpoint, "Using Cloud Storage emulator");
                    Arc::new(GcsStore::with_endpoint(client, endpoint))
                }
                Err(_) => Arc::new(GcsStore::new(client)),
            }
        }
        StorageBackend::S3 => {
            let aws = aws_config::load_from_env().await;
            Arc::new(S3Store::new(&aws))
        }
    };

    let kms = CloudKms::new(GoogleAuth::new(BasicClient::new()?, token_source));

    Ok(Clients {
        storage,
        kms: Arc::new(kms),
        kv: Arc::new(RedisConnector),
        renderer: Arc::new(TemplateRenderer::from_dir(&config.template_dir)),
    })
}

fn show_config(config: &SiteConfig, backend: StorageBackend) {
    let counters: Vec<String> = config.counters.iter().map(ToString::to_string).collect();

    info!(
        storage = ?backend,
        secrets_bucket = %config.secrets.bucket,
        secrets_object = %config.secrets.object,
        kms_key = %config.secrets.key,
        cache_service = %config.cache_service,
        site_bucket = %config.site_bucket,
        site_object = %config.site_object,
        template_dir = %config.template_dir.display(),
        template = %config.template,
        counters = %counters.join(","),
        "Resolved configuration"
    );
}
