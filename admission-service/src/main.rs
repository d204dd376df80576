use admission_service::{
    build_router,
    config::AdmissionConfig,
    pipeline::{AdmissionPipeline, InMemoryFilterRegistry, PipelineDependencies},
    services::{AuditLogFraudAnalytics, LocalSecurityProvider},
    AppState,
};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = AdmissionConfig::load()?;

    init_tracing(&config.service_name, &config.log_level, config.log_json);

    tracing::info!(
        service = %config.service_name,
        decipher_mode = ?config.decipher.mode,
        "Starting admission service"
    );
    if !config.security.require_signature {
        tracing::warn!("Request signature verification is disabled");
    }

    let security = LocalSecurityProvider::from_settings(&config.security)
        .map_err(|e| AppError::ConfigError(e.into()))?;
    let filters = InMemoryFilterRegistry::from_settings(&config.filters);

    let pipeline = AdmissionPipeline::new(
        &config,
        PipelineDependencies {
            security: Arc::new(security),
            fraud: Arc::new(AuditLogFraudAnalytics),
            filters: Arc::new(filters),
        },
    );

    let state = AppState {
        config: config.clone(),
        pipeline: Arc::new(pipeline),
    };
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    service_core::axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
