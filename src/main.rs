use roomcast::{router, AppState, Config};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomcast=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    info!(
        liveness_timeout_secs = config.connection.liveness_timeout.as_secs(),
        ping_period_secs = config.connection.ping_period.as_secs(),
        room_grace_secs = ?config.room_grace_period.map(|d| d.as_secs()),
        "Starting room broadcast server"
    );

    let state = AppState::from_config(&config);
    let hub = state.hub.clone();
    let app = router(state).layer(CorsLayer::permissive());

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.bind_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };
    info!("Server running on http://{}", config.bind_addr);

    // Drain the hub as soon as the signal arrives so every client gets its close frame
    // before the listener goes away
    let drain_timeout = config.connection.write_timeout * 2;
    let shutdown = async move {
        shutdown_signal().await;
        if tokio::time::timeout(drain_timeout, hub.shutdown()).await.is_err() {
            warn!(
                drain_timeout_secs = drain_timeout.as_secs(),
                "Timed out waiting for connections to close"
            );
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(error = %e, "Server error");
    }

    info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
