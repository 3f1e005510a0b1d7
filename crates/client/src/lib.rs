//! Host side of offgrid.
//!
//! This crate provides the HTTP transport the proxy fetches through and the
//! coordinator the host application uses to register, update and talk to
//! the proxy.

pub mod coordinator;
pub mod fetch;

pub use coordinator::{Coordinator, CoordinatorOptions, EventChannel, NOT_REGISTERED, Subscription, UpdateNotice};
pub use fetch::{FetchConfig, HttpFetcher, UrlError, canonicalize, resolve};
