//! Registration tools: proxy_register, proxy_unregister, proxy_update and
//! proxy_skip_waiting.

use offgrid_worker::{RegistrationInfo, UpdateOutcome};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::{ProxyState, json_result};

/// Output from the proxy_register tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RegisterOutput {
    /// False when the proxy runtime is disabled.
    pub registered: bool,
    pub scope: Option<String>,
    pub update_via_cache: Option<String>,
    /// Generation in control.
    pub active: Option<String>,
    /// Generation installed and waiting to take control.
    pub waiting: Option<String>,
}

impl From<Option<RegistrationInfo>> for RegisterOutput {
    fn from(info: Option<RegistrationInfo>) -> Self {
        match info {
            Some(info) => Self {
                registered: true,
                update_via_cache: Some(info.update_via_cache.as_str().to_string()),
                scope: Some(info.scope),
                active: info.active,
                waiting: info.waiting,
            },
            None => Self { registered: false, scope: None, update_via_cache: None, active: None, waiting: None },
        }
    }
}

/// Output from the proxy_unregister tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UnregisterOutput {
    /// Whether a registration existed.
    pub unregistered: bool,
}

/// Output from the proxy_update tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdateOutput {
    /// up_to_date, activated, or waiting.
    pub outcome: String,
    pub generation: Option<String>,
}

impl From<UpdateOutcome> for UpdateOutput {
    fn from(outcome: UpdateOutcome) -> Self {
        match outcome {
            UpdateOutcome::UpToDate => Self { outcome: "up_to_date".into(), generation: None },
            UpdateOutcome::Activated { generation } => Self { outcome: "activated".into(), generation: Some(generation) },
            UpdateOutcome::Waiting { generation } => Self { outcome: "waiting".into(), generation: Some(generation) },
        }
    }
}

/// Output from the proxy_skip_waiting tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SkipWaitingOutput {
    /// Whether a waiting generation was told to activate.
    pub requested: bool,
}

pub async fn register_impl(state: &ProxyState) -> Result<CallToolResult, McpError> {
    let info = state.coordinator.register().await?;
    json_result(&RegisterOutput::from(info))
}

pub async fn unregister_impl(state: &ProxyState) -> Result<CallToolResult, McpError> {
    let unregistered = state.coordinator.unregister().await;
    json_result(&UnregisterOutput { unregistered })
}

pub async fn update_impl(state: &ProxyState) -> Result<CallToolResult, McpError> {
    let outcome = state.coordinator.update().await?;
    json_result(&UpdateOutput::from(outcome))
}

pub async fn skip_waiting_impl(state: &ProxyState) -> Result<CallToolResult, McpError> {
    let requested = state.coordinator.skip_waiting().await?;
    json_result(&SkipWaitingOutput { requested })
}
