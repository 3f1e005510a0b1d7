//! Install and activate steps of a worker generation.
//!
//! ### Install
//! - Opens the critical and static partitions.
//! - Every critical asset must be fetched with an ok status and stored, or
//!   the install fails and the worker becomes redundant.
//! - Static assets are best-effort: failures are logged and skipped.
//!
//! ### Activate
//! - Deletes every partition that is not one of the generation's three.
//! - Claims every open client page.
//! - Posts `SW_UPDATED` to every claimed page.

use offgrid_core::{CacheDb, ClientMessage, Error, Fetcher, Generation, PartitionKind, ProxyRequest};
use serde::Serialize;
use url::Url;

use crate::clients::ClientRegistry;
use crate::release::Manifest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Installing,
    /// Installed and waiting for activation.
    Installed,
    Activating,
    Activated,
    /// Failed to install, or replaced by a newer generation.
    Redundant,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub critical_stored: usize,
    pub static_stored: usize,
    pub static_skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    /// Partitions deleted because they belong to another generation.
    pub evicted: Vec<String>,
    pub claimed: usize,
    pub notified: usize,
}

pub async fn install(
    cache: &CacheDb, fetcher: &dyn Fetcher, generation: &Generation, manifest: &Manifest,
) -> Result<InstallReport, Error> {
    let critical = generation.partition(PartitionKind::Critical);
    let static_partition = generation.partition(PartitionKind::Static);
    cache.open_partition(&critical).await?;
    cache.open_partition(&static_partition).await?;

    let mut report = InstallReport::default();

    for url in &manifest.critical {
        if let Err(reason) = precache(cache, fetcher, &critical, url).await {
            tracing::error!(generation = %generation, url = %url, reason = %reason, "critical precache failed");
            return Err(Error::InstallFailed { url: url.to_string(), reason });
        }
        report.critical_stored += 1;
    }

    for url in &manifest.static_assets {
        match precache(cache, fetcher, &static_partition, url).await {
            Ok(()) => report.static_stored += 1,
            Err(reason) => {
                tracing::warn!(generation = %generation, url = %url, reason = %reason, "static precache skipped");
                report.static_skipped += 1;
            }
        }
    }

    tracing::info!(
        generation = %generation,
        critical = report.critical_stored,
        static_stored = report.static_stored,
        static_skipped = report.static_skipped,
        "generation installed"
    );
    Ok(report)
}

async fn precache(cache: &CacheDb, fetcher: &dyn Fetcher, partition: &str, url: &Url) -> Result<(), String> {
    let request = ProxyRequest::get(url.clone());
    let response = fetcher.fetch(&request).await.map_err(|e| e.to_string())?;
    if !response.is_ok() {
        return Err(format!("status {}", response.status));
    }
    cache.put(partition, &request, &response).await.map_err(|e| e.to_string())
}

pub async fn activate(cache: &CacheDb, generation: &Generation, clients: &ClientRegistry) -> Result<ActivationReport, Error> {
    let mut report = ActivationReport::default();

    for name in cache.partition_names().await? {
        if generation.owns(&name) {
            continue;
        }
        if cache.delete_partition(&name).await? {
            tracing::info!(partition = %name, "evicted stale partition");
            report.evicted.push(name);
        }
    }

    for name in generation.partitions() {
        cache.open_partition(&name).await?;
    }

    let id = generation.id();
    report.claimed = clients.claim(&id);
    report.notified = clients.post_to_controlled(&id, &ClientMessage::SwUpdated { version: id.clone() });

    tracing::info!(
        generation = %id,
        evicted = report.evicted.len(),
        claimed = report.claimed,
        notified = report.notified,
        "generation activated"
    );
    Ok(report)
}
