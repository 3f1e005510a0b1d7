//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.

use std::sync::Arc;

use crate::tools::cache::{clear_impl, partitions_impl};
use crate::tools::proxy::{
    ProxyFetchParams, fetch_impl, register_impl, skip_waiting_impl, unregister_impl, update_impl, version_impl,
};
use crate::tools::ProxyState;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for offgrid.
#[derive(Clone)]
pub struct OffgridServer {
    state: Arc<ProxyState>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl OffgridServer {
    pub fn new(state: ProxyState) -> Self {
        Self { state: Arc::new(state), tool_router: Self::tool_router() }
    }

    /// Issue a request through the caching proxy.
    #[tool(
        description = "Fetch a URL through the offline caching proxy. Relative paths resolve against the app origin. Returns status, source (network, cache, synthetic), headers and body."
    )]
    async fn proxy_fetch(&self, params: Parameters<ProxyFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.state, params.0).await
    }

    #[tool(description = "Register the proxy, installing and activating the latest release. Idempotent.")]
    async fn proxy_register(&self) -> Result<CallToolResult, McpError> {
        register_impl(&self.state).await
    }

    #[tool(description = "Unregister the proxy, stop periodic update checks and drop event listeners.")]
    async fn proxy_unregister(&self) -> Result<CallToolResult, McpError> {
        unregister_impl(&self.state).await
    }

    #[tool(description = "Check for a new release now. Reports up_to_date, activated or waiting.")]
    async fn proxy_update(&self) -> Result<CallToolResult, McpError> {
        update_impl(&self.state).await
    }

    #[tool(description = "Tell a waiting release to take control now.")]
    async fn proxy_skip_waiting(&self) -> Result<CallToolResult, McpError> {
        skip_waiting_impl(&self.state).await
    }

    #[tool(description = "Report the generation in control (or \"not-registered\"), connectivity and update status.")]
    async fn proxy_version(&self) -> Result<CallToolResult, McpError> {
        version_impl(&self.state).await
    }

    #[tool(description = "Delete every cache partition. Falls back to direct deletion when the proxy cannot do it.")]
    async fn cache_clear(&self) -> Result<CallToolResult, McpError> {
        clear_impl(&self.state).await
    }

    #[tool(description = "List cache partitions with entry counts.")]
    async fn cache_partitions(&self) -> Result<CallToolResult, McpError> {
        partitions_impl(&self.state).await
    }
}

impl ServerHandler for OffgridServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offgrid".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
