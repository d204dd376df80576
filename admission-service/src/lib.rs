pub mod config;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod validation;

use service_core::axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::AdmissionConfig;
use crate::pipeline::AdmissionPipeline;

pub const AUTH_PATH: &str = "/idauthentication/v1/auth";

#[derive(Clone)]
pub struct AppState {
    pub config: AdmissionConfig,
    pub pipeline: Arc<AdmissionPipeline>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(AUTH_PATH, post(handlers::auth::authenticate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
