//! HTTP transport for the proxy.
//!
//! ### Behaviour
//! - Any status is returned as a response; only transport failures are errors.
//! - Timeouts map to `FETCH_TIMEOUT`, everything else to `NETWORK_ERROR`.
//! - Max redirects: 5
//! - Max body bytes: 10MB (configurable)
//! - Requests with `credentials: omit` never carry cookie or authorization
//!   headers.

pub mod url;

use std::time::{Duration, Instant};

use offgrid_core::config::AppConfig;
use offgrid_core::{Credentials, Error, Fetcher, ProxyRequest, ProxyResponse};
use reqwest::{Client, Method, header};

pub use self::url::{UrlError, canonicalize, resolve};

/// Headers dropped from requests that omit credentials.
const CREDENTIAL_HEADERS: &[&str] = &["cookie", "authorization", "proxy-authorization"];

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "offgrid/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "offgrid/0.1".to_string(),
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Self::default()
        }
    }
}

/// reqwest-backed [`Fetcher`].
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("method {}: {}", request.method, e)))?;

        let mut builder = self.http.request(method, request.url.clone());
        for (name, value) in outbound_headers(request) {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| transport_error(&request.url, e))?;

        let status = response.status();
        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().to_string();
        let mut proxied = ProxyResponse::new(status.as_u16(), status.canonical_reason().unwrap_or(""));
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                proxied.set_header(name.as_str(), value);
            }
        }

        let bytes = response.bytes().await.map_err(|e| transport_error(&request.url, e))?;
        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            url = %request.url,
            final_url = %final_url,
            status = status.as_u16(),
            bytes = bytes.len(),
            fetch_ms,
            "fetched"
        );

        proxied.url = Some(final_url);
        Ok(proxied.with_body(bytes.to_vec()))
    }
}

fn outbound_headers(request: &ProxyRequest) -> impl Iterator<Item = (&str, &str)> {
    let omit = request.credentials == Credentials::Omit;
    request
        .headers
        .iter()
        .filter(move |(name, _)| !(omit && CREDENTIAL_HEADERS.contains(&name.as_str())))
        .filter(|(name, _)| name.as_str() != header::HOST.as_str())
        .map(|(name, value)| (name.as_str(), value.as_str()))
}

fn transport_error(url: &::url::Url, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::FetchTimeout(format!("{url}: {e}"))
    } else {
        Error::Network(format!("{url}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::url::Url;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "offgrid/0.1");
        assert_eq!(config.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "bugtracker/2.0".into(), timeout_ms: 1500, ..Default::default() };
        let config = FetchConfig::from_app_config(&app);
        assert_eq!(config.user_agent, "bugtracker/2.0");
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_omitted_credentials_strip_headers() {
        let request = ProxyRequest::get(Url::parse("https://app.example.com/").unwrap())
            .with_header("cookie", "session=1")
            .with_header("authorization", "Bearer x")
            .with_header("accept", "text/html");

        let kept: Vec<_> = outbound_headers(&request).map(|(n, _)| n.to_string()).collect();
        assert_eq!(kept, vec!["accept", "authorization", "cookie"]);

        let revalidation = request.revalidation();
        let kept: Vec<_> = outbound_headers(&revalidation).map(|(n, _)| n.to_string()).collect();
        assert_eq!(kept, vec!["accept"]);
    }

    #[tokio::test]
    async fn test_http_fetcher_new() {
        assert!(HttpFetcher::new(FetchConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_refused_connection_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
        let request = ProxyRequest::get(Url::parse(&format!("http://{addr}/")).unwrap());
        let err = fetcher.fetch(&request).await.unwrap_err();
        assert!(err.is_network());
        assert!(matches!(err, Error::Network(_)));
    }
}
