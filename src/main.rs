//! House-rules API server.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use taxiway::house_rule::{HouseRules, Store};
use taxiway::config::Overrides;
use taxiway::{Info, Loader, Module, Registry, Router};

/// Serve the house-rules API and its OpenAPI document.
#[derive(Debug, Parser)]
#[command(name = "taxiway", version, about)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, env = "TAXIWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind.
    #[arg(long)]
    port: Option<u16>,

    /// Database URL (`:memory:`, a file path, or `libsql://...`).
    #[arg(long)]
    database_url: Option<String>,

    /// JWT secret; prefer the TAXIWAY_JWT_SECRET environment variable.
    #[arg(long)]
    jwt_secret: Option<String>,

    /// Path the OpenAPI document is served at.
    #[arg(long)]
    docs_path: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            database_url: self.database_url.clone(),
            jwt_secret: self.jwt_secret.clone(),
            docs_path: self.docs_path.clone(),
        }
    }
}

fn init_tracing() -> taxiway::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_target(false)
        .try_init()
        .map_err(|e| taxiway::Error::Config(format!("Failed to install tracing subscriber: {e}")))
}

#[tokio::main]
async fn main() -> taxiway::Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let config = Loader::new("TAXIWAY").load(cli.config.as_deref(), cli.overrides())?;

    let database = taxiway::db::connect(&config.database.url).await?;
    let store = Store::open(&database).await?;

    let mut router = Router::new();
    let mut registry = Registry::new();
    let modules: Vec<Box<dyn Module>> = vec![Box::new(HouseRules::new(store))];
    for module in &modules {
        module.routes(&mut router, &mut registry)?;
        info!(module = module.name(), "Module routes bound");
    }

    router.openapi(
        &config.docs.path,
        &registry,
        Info {
            title: "House Rules API",
            version: env!("CARGO_PKG_VERSION"),
        },
    )?;

    taxiway::server::run(Arc::new(config), router.into_handle()).await
}
