use service_core::error::AppError;
use service_core::observability::init_tracing;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use user_service::{
    build_router,
    config::UserConfig,
    db,
    services::{EmailService, PgUserStore},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = UserConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        accepted_versions = ?config.accepted_versions,
        "Starting user service"
    );

    let pool = db::create_pool(&config.database)
        .await
        .map_err(|e| AppError::DatabaseError(e.into()))?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.into()))?;

    let store = Arc::new(PgUserStore::new(pool));
    let mailer = Arc::new(EmailService::new(&config.gmail)?);

    let bind_address = config.common.bind_address();
    let grace = Duration::from_secs(config.common.shutdown_grace_seconds);

    let state = AppState::new(config, store, mailer)?;
    tracing::info!("Handler registry complete for every accepted version");

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "Listening");

    service_core::axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(grace))
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal(grace: Duration) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!(
        grace_seconds = grace.as_secs(),
        "Shutdown signal received, draining in-flight requests"
    );
    tokio::time::sleep(grace).await;
}
