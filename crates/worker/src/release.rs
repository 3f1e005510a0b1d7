//! Where update checks learn about new generations.
//!
//! A release pairs a generation with the manifest its install precaches.
//! The runtime asks its `ReleaseSource` for the latest release on every
//! update check and installs it when the generation differs from the one it
//! already has.

use std::path::PathBuf;

use offgrid_core::config::AppConfig;
use offgrid_core::{Error, Generation};
use serde::Deserialize;
use url::Url;

/// URLs precached during install.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    /// Must all be stored or the install fails.
    pub critical: Vec<Url>,
    /// Stored best-effort.
    pub static_assets: Vec<Url>,
}

impl Manifest {
    /// Resolve manifest paths against the application origin.
    pub fn resolve(origin: &Url, critical: &[String], static_assets: &[String]) -> Result<Self, Error> {
        let join = |path: &String| {
            origin
                .join(path)
                .map_err(|e| Error::InvalidUrl(format!("manifest entry {path}: {e}")))
        };
        Ok(Self {
            critical: critical.iter().map(join).collect::<Result<_, _>>()?,
            static_assets: static_assets.iter().map(join).collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    pub generation: Generation,
    pub manifest: Manifest,
}

impl Release {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            generation: config.generation()?,
            manifest: Manifest::resolve(&origin, &config.critical_assets, &config.static_assets)?,
        })
    }
}

#[async_trait::async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn latest(&self) -> Result<Release, Error>;
}

/// A release that never changes for the life of the process.
pub struct FixedRelease(pub Release);

#[async_trait::async_trait]
impl ReleaseSource for FixedRelease {
    async fn latest(&self) -> Result<Release, Error> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseDocument {
    build_date: String,
    #[serde(default)]
    critical: Vec<String>,
    #[serde(default, rename = "static")]
    static_assets: Vec<String>,
}

/// A JSON release file re-read on every update check.
///
/// ```json
/// { "build_date": "2025-01-15", "critical": ["/"], "static": ["/favicon.ico"] }
/// ```
pub struct ReleaseFile {
    path: PathBuf,
    prefix: String,
    origin: Url,
}

impl ReleaseFile {
    pub fn new(path: impl Into<PathBuf>, prefix: impl Into<String>, origin: Url) -> Self {
        Self { path: path.into(), prefix: prefix.into(), origin }
    }
}

#[async_trait::async_trait]
impl ReleaseSource for ReleaseFile {
    async fn latest(&self) -> Result<Release, Error> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::Release(format!("{}: {e}", self.path.display())))?;
        let doc: ReleaseDocument =
            serde_json::from_str(&raw).map_err(|e| Error::Release(format!("{}: {e}", self.path.display())))?;

        Ok(Release {
            generation: Generation::parse(&self.prefix, &doc.build_date)?,
            manifest: Manifest::resolve(&self.origin, &doc.critical, &doc.static_assets)?,
        })
    }
}
