//! proxy_fetch tool implementation.
//!
//! Issues one request through the proxy exactly as a host page would, so the
//! response comes from whichever strategy the request classifies into.

use std::collections::BTreeMap;

use offgrid_client::resolve;
use offgrid_core::{Credentials, Destination, ProxyRequest, RequestMode, ResponseSource};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::tools::{ProxyState, json_result};

/// Input parameters for proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchParams {
    /// Absolute URL, or a path resolved against the app origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests are intercepted.
    #[serde(default = "default_method")]
    pub method: String,

    /// Resource kind: document, script, style, image, font, manifest, other.
    /// Documents are sent as navigations.
    #[serde(default)]
    pub destination: Destination,

    /// Request mode. Defaults to navigate for documents, same-origin otherwise.
    #[serde(default)]
    pub mode: Option<RequestMode>,

    /// Credentials policy (default: same-origin).
    #[serde(default)]
    pub credentials: Credentials,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchOutput {
    /// The resolved request URL.
    pub url: String,
    pub status: u16,
    pub status_text: String,
    /// network, cache, or synthetic.
    pub source: ResponseSource,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Body decoded as UTF-8, lossy.
    pub body: String,
    pub body_bytes: usize,
}

impl ProxyFetchParams {
    fn into_request(self, state: &ProxyState) -> Result<ProxyRequest, ToolError> {
        let method = self.method.trim().to_ascii_uppercase();
        if method.is_empty() {
            return Err(ToolError::InvalidInput("method must not be empty".into()));
        }

        let url = resolve(&self.url, &state.origin)?;
        let mode = self.mode.unwrap_or(match self.destination {
            Destination::Document => RequestMode::Navigate,
            _ => RequestMode::SameOrigin,
        });

        let mut request = ProxyRequest {
            url,
            method,
            destination: self.destination,
            mode,
            credentials: self.credentials,
            headers: BTreeMap::new(),
        };
        for (name, value) in self.headers {
            request = request.with_header(&name, value);
        }
        Ok(request)
    }
}

/// Implementation of the proxy_fetch tool.
pub async fn fetch_impl(state: &ProxyState, params: ProxyFetchParams) -> Result<CallToolResult, McpError> {
    let request = params.into_request(state)?;
    let url = request.url.to_string();

    let response = state.coordinator.runtime().fetch(request).await?;

    let output = ProxyFetchOutput {
        url,
        status: response.status,
        status_text: response.status_text.clone(),
        source: response.source,
        content_type: response.content_type().map(str::to_string),
        body: response.text(),
        body_bytes: response.body.len(),
        headers: response.headers,
    };
    json_result(&output)
}
