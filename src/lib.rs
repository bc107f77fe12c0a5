//! HERALD — Korean news aggregation and summarization service
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod ai;
pub mod cache;
pub mod collector;
pub mod config;
pub mod markets;
pub mod search;
pub mod server;
pub mod sources;
pub mod storage;
pub mod types;
