//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFGRID_*)
//! 2. TOML config file (if OFFGRID_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::generation::Generation;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFGRID_*)
/// 2. TOML config file (if OFFGRID_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite partition store.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Prefix shared by generation ids and partition names.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Build date (`YYYY-MM-DD`) of the current generation. Today when unset.
    #[serde(default)]
    pub build_date: Option<String>,

    /// Origin that manifest paths and the offline document resolve against.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Optional JSON release file re-read on every update check.
    #[serde(default)]
    pub release_file: Option<PathBuf>,

    /// Paths that must be precached for install to succeed.
    #[serde(default = "default_critical_assets")]
    pub critical_assets: Vec<String>,

    /// Paths precached on a best-effort basis.
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    /// Root document served to offline navigations.
    #[serde(default = "default_offline_document")]
    pub offline_document: String,

    /// Path fragment marking API endpoints (network-first).
    #[serde(default = "default_api_path_marker")]
    pub api_path_marker: String,

    /// URL substrings that are never intercepted.
    #[serde(default = "default_excluded_patterns")]
    pub excluded_patterns: Vec<String>,

    /// Hosts treated as local development servers (never intercepted).
    #[serde(default = "default_dev_hosts")]
    pub dev_hosts: Vec<String>,

    /// File extensions served cache-first.
    #[serde(default = "default_static_extensions")]
    pub static_extensions: Vec<String>,

    /// Hosts for which stale-while-revalidate never revalidates.
    #[serde(default = "default_swr_bypass_domains")]
    pub swr_bypass_domains: Vec<String>,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum response body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Network request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// How long a control call waits for its reply.
    #[serde(default = "default_control_timeout_ms")]
    pub control_timeout_ms: u64,

    /// Interval between background update checks.
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,

    /// Run update checks in idle windows when possible.
    #[serde(default = "default_true")]
    pub idle_scheduling: bool,

    /// Whether the proxy runtime is available at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offgrid-cache.sqlite")
}

fn default_cache_prefix() -> String {
    "app".into()
}

fn default_origin() -> String {
    "https://app.example.com".into()
}

fn default_critical_assets() -> Vec<String> {
    vec!["/".into(), "/index.html".into(), "/manifest.json".into()]
}

fn default_static_assets() -> Vec<String> {
    vec!["/favicon.ico".into(), "/icons/icon-192.png".into(), "/icons/icon-512.png".into()]
}

fn default_offline_document() -> String {
    "/".into()
}

fn default_api_path_marker() -> String {
    "/api/".into()
}

fn default_excluded_patterns() -> Vec<String> {
    [
        "chrome-extension://",
        "moz-extension://",
        "safari-extension://",
        "/@vite/",
        "/@react-refresh",
        "/__vite_ping",
        "/sockjs-node",
        "/webpack-dev-server",
        "livereload",
        "/__webpack_hmr",
        "hot-update",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_dev_hosts() -> Vec<String> {
    vec!["localhost".into(), "127.0.0.1".into(), "0.0.0.0".into(), "::1".into()]
}

fn default_static_extensions() -> Vec<String> {
    ["js", "mjs", "css", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "woff", "woff2", "ttf", "otf", "eot"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_swr_bypass_domains() -> Vec<String> {
    vec!["fonts.googleapis.com".into(), "fonts.gstatic.com".into()]
}

fn default_user_agent() -> String {
    "offgrid/0.1".into()
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_control_timeout_ms() -> u64 {
    5_000
}

fn default_update_interval_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_prefix: default_cache_prefix(),
            build_date: None,
            origin: default_origin(),
            release_file: None,
            critical_assets: default_critical_assets(),
            static_assets: default_static_assets(),
            offline_document: default_offline_document(),
            api_path_marker: default_api_path_marker(),
            excluded_patterns: default_excluded_patterns(),
            dev_hosts: default_dev_hosts(),
            static_extensions: default_static_extensions(),
            swr_bypass_domains: default_swr_bypass_domains(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            control_timeout_ms: default_control_timeout_ms(),
            update_interval_secs: default_update_interval_secs(),
            idle_scheduling: true,
            enabled: true,
        }
    }
}

impl AppConfig {
    /// Network timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    /// Generation described by `cache_prefix` and `build_date`.
    pub fn generation(&self) -> Result<Generation, Error> {
        match &self.build_date {
            Some(date) => Generation::parse(&self.cache_prefix, date),
            None => Ok(Generation::today(&self.cache_prefix)),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OFFGRID_`
    /// 2. TOML file from `OFFGRID_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed, or
    /// validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment()
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFGRID_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("OFFGRID_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }
}
