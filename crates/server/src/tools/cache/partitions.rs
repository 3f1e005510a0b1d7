//! cache_partitions tool implementation.
//!
//! Lists every partition in the store with its entry count.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::{ProxyState, json_result};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PartitionSummary {
    pub name: String,
    pub entries: u64,
    /// Whether the partition belongs to the generation in control.
    pub current: bool,
}

/// Output from the cache_partitions tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePartitionsOutput {
    pub partitions: Vec<PartitionSummary>,
}

/// Implementation of the cache_partitions tool.
pub async fn partitions_impl(state: &ProxyState) -> Result<CallToolResult, McpError> {
    let runtime = state.coordinator.runtime();
    let cache = runtime.cache();
    let controller = runtime.active_generation();

    let mut partitions = Vec::new();
    for name in cache.partition_names().await? {
        let entries = cache.entry_count(&name).await?;
        let current = controller.as_ref().is_some_and(|generation| generation.owns(&name));
        partitions.push(PartitionSummary { name, entries, current });
    }

    json_result(&CachePartitionsOutput { partitions })
}
