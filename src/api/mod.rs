//! HTTP API for the lecture analyzer
//!
//! JSON endpoints for chapter generation, cognitive-load curves, full
//! analysis jobs, stored artifacts and the auxiliary LLM services.

use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::analysis::Analyzer;
use crate::enrich::WikipediaClient;

pub mod handlers;
pub mod models;
pub mod server;

pub use server::{router, AppState};

/// API Server for handling REST requests
pub struct ApiServer {
    state: AppState,
    host: String,
    port: u16,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(analyzer: Arc<Analyzer>, host: impl Into<String>, port: u16) -> Result<Self> {
        Ok(Self {
            state: AppState {
                analyzer,
                wikipedia: Arc::new(WikipediaClient::new()?),
            },
            host: host.into(),
            port,
        })
    }

    /// Start the API server in the background
    pub fn start_background(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move { self.start().await })
    }

    /// Start the API server
    pub async fn start(self) -> Result<()> {
        info!("🚀 Starting API server on {}:{}", self.host, self.port);
        server::start_http_server(self.state, &self.host, self.port).await
    }
}
