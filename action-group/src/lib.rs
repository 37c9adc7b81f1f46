//! Transactions action endpoint
//!
//! Scans a table store and answers the agent's action-group invocation.

pub mod api;
pub mod config;
pub mod handler;
pub mod store;
