//! proxy_version tool implementation.

use offgrid_worker::Connectivity;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::{ProxyState, json_result};

/// Output from the proxy_version tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VersionOutput {
    /// Generation id reported by the active proxy, or "not-registered".
    pub version: String,
    /// Generation waiting to take control, if any.
    pub waiting: Option<String>,
    /// online or offline.
    pub connectivity: String,
    /// ISO8601 timestamp of the last update check.
    pub last_update_check: Option<String>,
    /// Version carried by the last update message the host page received.
    pub last_update_notice: Option<String>,
    /// Reply timeout for control messages to the active proxy.
    pub control_timeout_ms: Option<u64>,
}

/// Implementation of the proxy_version tool.
pub async fn version_impl(state: &ProxyState) -> Result<CallToolResult, McpError> {
    let coordinator = &state.coordinator;
    let version = coordinator.get_version().await?;
    let waiting = coordinator.registration().await.and_then(|r| r.waiting);
    let connectivity = match coordinator.runtime().connectivity() {
        Connectivity::Online => "online",
        Connectivity::Offline => "offline",
    };

    let control_timeout_ms = coordinator
        .runtime()
        .controller()
        .map(|control| u64::try_from(control.timeout().as_millis()).unwrap_or(u64::MAX));

    let output = VersionOutput {
        version,
        waiting,
        connectivity: connectivity.into(),
        last_update_check: coordinator.last_update_check().map(|t| t.to_rfc3339()),
        last_update_notice: coordinator.last_update_notice(),
        control_timeout_ms,
    };
    json_result(&output)
}
