//! Proxy tools: issue requests through the proxy and drive its lifecycle.

pub mod fetch;
pub mod lifecycle;
pub mod version;

pub use fetch::{ProxyFetchParams, fetch_impl};
pub use lifecycle::{register_impl, skip_waiting_impl, unregister_impl, update_impl};
pub use version::version_impl;
