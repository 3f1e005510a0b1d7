//! The request-interception proxy.
//!
//! A worker runs as a detached tokio task and is reachable only through
//! channels: intercepted requests, lifecycle commands and control messages.
//! The [`Runtime`] hosts workers the way a browser hosts a registration:
//! it installs new generations, activates them, routes requests to the
//! active one and reports lifecycle and connectivity events.

pub mod classifier;
pub mod clients;
pub mod connectivity;
pub mod control;
pub mod lifecycle;
pub mod release;
pub mod runtime;
pub mod strategy;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use classifier::{Classifier, Strategy};
pub use clients::{ClientId, ClientPage, ClientRegistry};
pub use connectivity::{Connectivity, ConnectivityMonitor, MonitoredFetcher};
pub use control::ControlChannel;
pub use lifecycle::{ActivationReport, InstallReport, LifecycleState};
pub use release::{FixedRelease, Manifest, Release, ReleaseFile, ReleaseSource};
pub use runtime::{RegistrationInfo, Runtime, RuntimeEvent, RuntimeOptions, UpdateOutcome, UpdateViaCache};
pub use worker::{FetchDisposition, WorkerHandle};
