use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trackademic::api::router;
use trackademic::clock::SystemClock;
use trackademic::config::AppConfig;
use trackademic::db;
use trackademic::services::start_reminder_job;
use trackademic::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "trackademic=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let pool = db::connect(&config.database_url).await?;
    db::migrate(&pool).await?;

    let reminder_job = start_reminder_job(pool.clone(), &config)?;

    let state = AppState {
        db: pool.clone(),
        jwt_secret: Arc::from(config.jwt_secret.as_str()),
        clock: Arc::new(SystemClock),
    };

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Trackademic API listening on http://{}", addr);
    info!("Client origins: {}", config.client_origins().join(", "));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reminder_job.stop().await;
    pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
