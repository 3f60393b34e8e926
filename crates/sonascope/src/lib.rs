//! Sonascope service library: application state and router assembly.

pub mod config;
pub mod error;
pub mod web;

pub use config::{ServerConfig, ConfigError};
pub use error::{ApiError, ApiResult};

use axum::routing::{get, post};
use axum::Router;
use form_analysis::AnalysisParams;
use form_enhance::{Enhancer, HttpEnhancer};
use std::sync::Arc;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub params: AnalysisParams,
    /// Optional enhancement backend; None disables enhancement entirely
    pub enhancer: Option<Arc<dyn Enhancer>>,
}

impl AppState {
    pub fn from_config(config: &ServerConfig) -> Self {
        let enhancer: Option<Arc<dyn Enhancer>> = config
            .enhance
            .as_ref()
            .filter(|e| !e.endpoint.is_empty())
            .map(|e| Arc::new(HttpEnhancer::new(e.clone())) as Arc<dyn Enhancer>);

        Self {
            params: config.analysis.clone(),
            enhancer,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(web::serve_root))
        .route("/health", get(web::health))
        .route("/analyze", post(web::analyze))
        .with_state(state)
}
