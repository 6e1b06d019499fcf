//! Network fetchers.
//!
//! This module provides:
//! - The `Fetcher` trait the router consumes
//! - `HttpFetcher`, a reqwest-backed implementation for real hosts
//! - `ScriptedFetcher`, a table-driven implementation for tests and demos

mod client;
mod fetcher;
mod scripted;

pub use client::HttpFetcher;
pub use fetcher::{DynFetcher, Fetcher};
pub use scripted::ScriptedFetcher;
