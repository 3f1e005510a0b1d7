//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and clearing the partition store.

pub mod clear;
pub mod partitions;

pub use clear::clear_impl;
pub use partitions::partitions_impl;
