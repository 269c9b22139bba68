//! Common test utilities for hn-crawl integration tests

#[allow(dead_code)]
pub mod server;

pub use server::*;
