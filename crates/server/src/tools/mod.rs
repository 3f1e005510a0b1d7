//! MCP tool implementations.
//!
//! This module contains all tools exposed by the offgrid server. Every tool
//! works through the [`ProxyState`] shared by the handler.

pub mod cache;
pub mod proxy;

#[cfg(test)]
pub(crate) mod testing;

use offgrid_client::Coordinator;
use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use url::Url;

/// State shared by every tool call.
pub struct ProxyState {
    pub coordinator: Coordinator,
    /// Relative request URLs resolve against this origin.
    pub origin: Url,
}

/// Render a tool output as pretty JSON.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(offgrid_core::Error::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
