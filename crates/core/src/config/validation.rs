//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for out-of-range limits, an unparsable
    /// origin or build date, or an empty prefix/user agent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_prefix.is_empty() || self.cache_prefix.contains(char::is_whitespace) {
            return Err(invalid("cache_prefix", "must be non-empty and contain no whitespace"));
        }

        if self.generation().is_err() {
            return Err(invalid("build_date", "must be a YYYY-MM-DD date"));
        }

        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") => {}
            _ => return Err(invalid("origin", "must be an absolute http(s) URL")),
        }

        if !self.offline_document.starts_with('/') {
            return Err(invalid("offline_document", "must be an absolute path"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 100 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 100MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.control_timeout_ms == 0 {
            return Err(invalid("control_timeout_ms", "must be greater than 0"));
        }

        if self.update_interval_secs < 60 {
            return Err(invalid("update_interval_secs", "must be at least 60 seconds"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.critical_assets.is_empty() {
            tracing::warn!("critical_assets is empty; install will not precache any critical document");
        }

        Ok(())
    }
}
