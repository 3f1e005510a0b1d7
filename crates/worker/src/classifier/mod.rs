//! Request classification.
//!
//! Decides whether the proxy intercepts a request at all, and which caching
//! strategy resolves it.
//!
//! ### Eligibility
//! - Only `http` and `https` URLs
//! - No URL containing a configured exclusion (API base URL, extension
//!   schemes, dev-server and live-reload endpoints, hot-update chunks)
//! - No loopback or development host
//!
//! ### Strategy selection, first match wins
//! 1. Path contains the API marker: network first
//! 2. Destination is `script`: module fetch
//! 3. Static extension (script, style, image, font): cache first
//! 4. Anything else: stale while revalidate

pub mod hosts;

use std::collections::HashSet;

use offgrid_core::config::AppConfig;
use offgrid_core::{Destination, ProxyRequest};

/// Policy used to resolve an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    NetworkFirst,
    CacheFirst,
    StaleWhileRevalidate,
    ModuleFetch,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::NetworkFirst => "network-first",
            Strategy::CacheFirst => "cache-first",
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
            Strategy::ModuleFetch => "module-fetch",
        }
    }
}

/// Interception rules.
#[derive(Debug, Clone)]
pub struct Classifier {
    excluded_patterns: Vec<String>,
    dev_hosts: Vec<String>,
    api_path_marker: String,
    static_extensions: HashSet<String>,
}

impl Classifier {
    pub fn new(
        excluded_patterns: Vec<String>, dev_hosts: Vec<String>, api_path_marker: impl Into<String>,
        static_extensions: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            excluded_patterns,
            dev_hosts,
            api_path_marker: api_path_marker.into(),
            static_extensions: static_extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.excluded_patterns.clone(),
            config.dev_hosts.clone(),
            config.api_path_marker.clone(),
            config.static_extensions.clone(),
        )
    }

    /// Whether the request may be intercepted and its responses stored.
    pub fn is_eligible(&self, request: &ProxyRequest) -> bool {
        if !matches!(request.url.scheme(), "http" | "https") {
            return false;
        }

        let url = request.url.as_str();
        if self.excluded_patterns.iter().any(|pattern| url.contains(pattern.as_str())) {
            return false;
        }

        match request.url.host() {
            Some(host) => !hosts::is_dev_host(&host, &self.dev_hosts),
            None => false,
        }
    }

    /// Eligible `GET` requests are intercepted; everything else passes through.
    pub fn should_intercept(&self, request: &ProxyRequest) -> bool {
        request.is_get() && self.is_eligible(request)
    }

    pub fn select_strategy(&self, request: &ProxyRequest) -> Strategy {
        if request.url.path().contains(self.api_path_marker.as_str()) {
            return Strategy::NetworkFirst;
        }

        if request.destination == Destination::Script {
            return Strategy::ModuleFetch;
        }

        if self.has_static_extension(request) {
            return Strategy::CacheFirst;
        }

        Strategy::StaleWhileRevalidate
    }

    fn has_static_extension(&self, request: &ProxyRequest) -> bool {
        let last_segment = request.url.path().rsplit('/').next().unwrap_or_default();
        match last_segment.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => self.static_extensions.contains(&ext.to_ascii_lowercase()),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn classifier() -> Classifier {
        let mut config = AppConfig::default();
        config.excluded_patterns.push("https://backend.example.com/v1".to_string());
        Classifier::from_config(&config)
    }

    fn get(url: &str) -> ProxyRequest {
        ProxyRequest::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_eligible_app_requests() {
        let c = classifier();
        assert!(c.is_eligible(&get("https://app.example.com/")));
        assert!(c.is_eligible(&get("https://cdn.example.net/lib.js")));
        assert!(c.is_eligible(&get("http://app.example.com/projects/42")));
    }

    #[test]
    fn test_excluded_patterns() {
        let c = classifier();
        assert!(!c.is_eligible(&get("https://backend.example.com/v1/bugs")));
        assert!(!c.is_eligible(&get("https://app.example.com/@vite/client")));
        assert!(!c.is_eligible(&get("https://app.example.com/main.abc123.hot-update.js")));
        assert!(!c.is_eligible(&get("https://app.example.com/sockjs-node/info")));
        assert!(!c.is_eligible(&get("https://app.example.com/livereload.js")));
    }

    #[test]
    fn test_non_http_schemes() {
        let c = classifier();
        assert!(!c.is_eligible(&get("chrome-extension://abcdef/content.js")));
        assert!(!c.is_eligible(&get("moz-extension://abcdef/content.js")));
        assert!(!c.is_eligible(&get("data:text/plain,hello")));
        assert!(!c.is_eligible(&get("ws://app.example.com/socket")));
    }

    #[test]
    fn test_dev_hosts_not_eligible() {
        let c = classifier();
        assert!(!c.is_eligible(&get("http://localhost:5173/src/main.ts")));
        assert!(!c.is_eligible(&get("http://127.0.0.1:8080/")));
        assert!(!c.is_eligible(&get("http://[::1]/")));
    }

    #[test]
    fn test_only_get_intercepted() {
        let c = classifier();
        let post = get("https://app.example.com/api/bugs").with_method("POST");
        assert!(c.is_eligible(&post));
        assert!(!c.should_intercept(&post));
        assert!(c.should_intercept(&get("https://app.example.com/api/bugs")));
    }

    #[test]
    fn test_api_is_network_first() {
        let c = classifier();
        assert_eq!(c.select_strategy(&get("https://app.example.com/api/bugs?page=2")), Strategy::NetworkFirst);
        let script_api = get("https://app.example.com/api/config.js").with_destination(Destination::Script);
        assert_eq!(c.select_strategy(&script_api), Strategy::NetworkFirst);
    }

    #[test]
    fn test_static_extensions_cache_first() {
        let c = classifier();
        for url in [
            "https://app.example.com/assets/app.css",
            "https://app.example.com/assets/logo.PNG",
            "https://app.example.com/fonts/inter.woff2",
            "https://app.example.com/assets/vendor.js",
        ] {
            assert_eq!(c.select_strategy(&get(url)), Strategy::CacheFirst, "{url}");
        }
    }

    #[test]
    fn test_script_destination_overrides_extension() {
        let c = classifier();
        let with_ext = get("https://app.example.com/assets/index-4f2a.js").with_destination(Destination::Script);
        assert_eq!(c.select_strategy(&with_ext), Strategy::ModuleFetch);

        let without_ext = get("https://app.example.com/modules/entry").with_destination(Destination::Script);
        assert_eq!(c.select_strategy(&without_ext), Strategy::ModuleFetch);
    }

    #[test]
    fn test_everything_else_stale_while_revalidate() {
        let c = classifier();
        assert_eq!(c.select_strategy(&get("https://app.example.com/projects/7")), Strategy::StaleWhileRevalidate);
        assert_eq!(c.select_strategy(&get("https://app.example.com/.well-known")), Strategy::StaleWhileRevalidate);
        assert_eq!(
            c.select_strategy(&ProxyRequest::navigate(Url::parse("https://app.example.com/").unwrap())),
            Strategy::StaleWhileRevalidate
        );
    }
}
