//! offgrid server entry point.
//!
//! Boots the caching proxy, registers it and serves the MCP tools on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use offgrid_client::{Coordinator, CoordinatorOptions, FetchConfig, HttpFetcher};
use offgrid_core::CacheDb;
use offgrid_core::config::AppConfig;
use offgrid_worker::{FixedRelease, Release, ReleaseFile, ReleaseSource, Runtime, RuntimeOptions};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use url::Url;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let origin = Url::parse(&config.origin)?;
    tracing::info!(origin = %origin, db = %config.db_path.display(), "starting offgrid on stdio transport");

    let cache = CacheDb::open(&config.db_path).await?;
    let fetcher = Arc::new(HttpFetcher::new(FetchConfig::from_app_config(&config))?);
    let release: Arc<dyn ReleaseSource> = match &config.release_file {
        Some(path) => Arc::new(ReleaseFile::new(path, config.cache_prefix.clone(), origin.clone())),
        None => Arc::new(FixedRelease(Release::from_config(&config)?)),
    };

    let runtime = Runtime::new(cache, fetcher, release, RuntimeOptions::from_config(&config)?);
    let coordinator = Coordinator::new(runtime, CoordinatorOptions::from_config(&config));

    match coordinator.register().await {
        Ok(Some(info)) => tracing::info!(active = ?info.active, "proxy ready"),
        Ok(None) => tracing::info!("proxy disabled"),
        Err(e) => tracing::warn!(error = %e, "starting without a registration"),
    }

    let handler = handler::OffgridServer::new(tools::ProxyState { coordinator, origin });
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    Ok(())
}
