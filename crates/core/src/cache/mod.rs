//! SQLite-backed partition store.
//!
//! This module provides named cache partitions holding response snapshots,
//! with async access via tokio-rusqlite. It supports:
//!
//! - Request keys derived from method and canonical URL (SHA-256)
//! - Automatic schema migrations
//! - WAL mode for concurrent access from the worker and the host
//! - Partition enumeration and bulk deletion

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod partitions;

pub use crate::Error;

pub use connection::CacheDb;
pub use hash::request_key;
