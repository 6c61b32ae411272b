//! Bucket index library: a cached HTML/JSON listing of an object storage bucket.
//!
//! This crate provides the listing backends, the refreshable snapshot cache
//! and the HTTP surface that serves it.  The bucket is listed once at
//! startup and again on the first request after the snapshot expires.

use std::sync::Arc;

pub mod cache;
pub mod config;
pub mod errors;
pub mod listing;
pub mod metrics;
pub mod render;
pub mod server;
pub mod storage;

use crate::cache::Cache;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Snapshot cache for the indexed bucket.
    pub cache: Arc<Cache>,
}
