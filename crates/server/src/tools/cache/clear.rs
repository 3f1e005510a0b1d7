//! cache_clear tool implementation.
//!
//! Deletes every partition, through the proxy when one is active and
//! directly otherwise.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::{ProxyState, json_result};

/// Output from the cache_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearOutput {
    /// Always true.
    pub cleared: bool,
}

/// Implementation of the cache_clear tool.
pub async fn clear_impl(state: &ProxyState) -> Result<CallToolResult, McpError> {
    let cleared = state.coordinator.clear_cache().await;
    json_result(&CacheClearOutput { cleared })
}
