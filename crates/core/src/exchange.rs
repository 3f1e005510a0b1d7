//! Request and response descriptors.
//!
//! These travel from the host to the worker, from the worker to the network,
//! and into the partition store. Header names are always stored lowercase.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Canonical content type for executable script modules.
pub const JAVASCRIPT_CONTENT_TYPE: &str = "application/javascript; charset=utf-8";

/// What kind of resource a request is fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    #[default]
    Empty,
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
    Other,
}

/// Request mode, distinguishing top-level navigations from sub-resource loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    Navigate,
    Cors,
    NoCors,
    #[default]
    SameOrigin,
}

/// Whether ambient credentials accompany a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Credentials {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

/// An outbound request as seen by the proxy.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyRequest {
    pub url: Url,
    pub method: String,
    pub destination: Destination,
    pub mode: RequestMode,
    pub credentials: Credentials,
    pub headers: BTreeMap<String, String>,
}

impl ProxyRequest {
    /// A plain `GET` sub-resource request.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: "GET".to_string(),
            destination: Destination::Empty,
            mode: RequestMode::default(),
            credentials: Credentials::default(),
            headers: BTreeMap::new(),
        }
    }

    /// A top-level document load.
    pub fn navigate(url: Url) -> Self {
        Self { destination: Destination::Document, mode: RequestMode::Navigate, ..Self::get(url) }
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into().to_ascii_uppercase();
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Copy of this request used for background revalidation: explicit CORS,
    /// no credentials.
    pub fn revalidation(&self) -> Self {
        Self { mode: RequestMode::Cors, credentials: Credentials::Omit, ..self.clone() }
    }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    #[default]
    Network,
    Cache,
    Synthetic,
}

/// A response snapshot: status, headers and the fully buffered body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub url: Option<String>,
    #[serde(default)]
    pub source: ResponseSource,
}

impl ProxyResponse {
    pub fn new(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: BTreeMap::new(),
            body: Vec::new(),
            url: None,
            source: ResponseSource::Network,
        }
    }

    /// A response produced locally when neither cache nor network could answer.
    pub fn synthetic(status: u16, status_text: &str, body: &str) -> Self {
        Self::new(status, status_text)
            .with_header("content-type", "text/plain")
            .with_body(body)
            .with_source(ResponseSource::Synthetic)
    }

    /// `503 Service Unavailable` with body `Offline`.
    pub fn offline() -> Self {
        Self::synthetic(503, "Service Unavailable", "Offline")
    }

    /// `504 Gateway Timeout`.
    pub fn gateway_timeout() -> Self {
        Self::synthetic(504, "Gateway Timeout", "Gateway Timeout")
    }

    /// Empty `200` used where a resource must not be revalidated and nothing is cached.
    pub fn placeholder() -> Self {
        Self::new(200, "OK").with_source(ResponseSource::Synthetic)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = source;
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only complete `200` responses are stored.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigate_request() {
        let req = ProxyRequest::navigate(Url::parse("https://app.example.com/").unwrap());
        assert!(req.is_navigation());
        assert_eq!(req.destination, Destination::Document);
        assert!(req.is_get());
    }

    #[test]
    fn test_revalidation_request() {
        let req = ProxyRequest::get(Url::parse("https://app.example.com/page").unwrap())
            .with_header("Cookie", "session=1");
        let reval = req.revalidation();
        assert_eq!(reval.mode, RequestMode::Cors);
        assert_eq!(reval.credentials, Credentials::Omit);
        assert_eq!(reval.url, req.url);
    }

    #[test]
    fn test_offline_response() {
        let res = ProxyResponse::offline();
        assert_eq!(res.status, 503);
        assert_eq!(res.status_text, "Service Unavailable");
        assert_eq!(res.text(), "Offline");
        assert_eq!(res.content_type(), Some("text/plain"));
        assert_eq!(res.source, ResponseSource::Synthetic);
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        let res = ProxyResponse::new(200, "OK").with_header("Content-Type", "text/css");
        assert_eq!(res.header("content-type"), Some("text/css"));
        assert_eq!(res.header("CONTENT-TYPE"), Some("text/css"));
    }

    #[test]
    fn test_cacheable_only_200() {
        assert!(ProxyResponse::new(200, "OK").is_cacheable());
        assert!(!ProxyResponse::new(204, "No Content").is_cacheable());
        assert!(ProxyResponse::new(204, "No Content").is_ok());
        assert!(!ProxyResponse::new(404, "Not Found").is_cacheable());
    }

    #[test]
    fn test_destination_serde() {
        let d: Destination = serde_json::from_str("\"script\"").unwrap();
        assert_eq!(d, Destination::Script);
        let m: RequestMode = serde_json::from_str("\"no-cors\"").unwrap();
        assert_eq!(m, RequestMode::NoCors);
    }
}
