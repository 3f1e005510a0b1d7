//! Core types and shared functionality for offgrid.
//!
//! This crate provides:
//! - Partition store with SQLite backend
//! - Cache generation naming
//! - Request/response descriptors and the `Fetcher` seam
//! - Control channel and broadcast message schema
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod exchange;
pub mod fetch;
pub mod generation;
pub mod protocol;

pub use cache::CacheDb;
pub use error::Error;
pub use exchange::{Credentials, Destination, ProxyRequest, ProxyResponse, RequestMode, ResponseSource};
pub use fetch::Fetcher;
pub use generation::{Generation, PartitionKind};
pub use protocol::{ClientMessage, ControlMessage, ControlReply};
