//! Health check endpoint

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::registry::RegistryStatsSnapshot;
use crate::routes::json_response;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub uptime: u64,
    /// "mongodb" or "memory"
    pub store: &'static str,
    pub mode: &'static str,
    pub registry: RegistryHealth,
}

#[derive(Serialize)]
pub struct RegistryHealth {
    pub entries: usize,
    pub fresh: u64,
    pub refreshes: u64,
    pub evictions: u64,
}

impl RegistryHealth {
    fn new(entries: usize, stats: RegistryStatsSnapshot) -> Self {
        Self {
            entries,
            fresh: stats.fresh,
            refreshes: stats.refreshes,
            evictions: stats.evictions,
        }
    }
}

/// GET /health
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let response = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        store: state.store_backend,
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        registry: RegistryHealth::new(state.registry.len(), state.registry.stats()),
    };

    json_response(StatusCode::OK, &response)
}
