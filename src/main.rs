// src/main.rs

use std::net::SocketAddr;
use std::time::Duration;

use dotenvy::dotenv;
use quiz_backend::config::Config;
use quiz_backend::routes;
use quiz_backend::services::session::SessionStore;
use quiz_backend::state::AppState;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Make sure the storage root exists before discovery scans it
    if let Err(e) = tokio::fs::create_dir_all(&config.data_dir).await {
        tracing::error!(
            "Failed to create data directory {}: {}",
            config.data_dir.display(),
            e
        );
    }
    tracing::info!("Serving test databases from {}", config.data_dir.display());

    let state = AppState::new(config.clone());

    spawn_session_reaper(
        state.sessions.clone(),
        chrono::Duration::minutes(config.session_idle_minutes),
    );

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Start the server
    axum::serve(listener, app).await.unwrap();
}

/// Periodically forgets attempts and user sessions nobody touched for `max_idle`.
fn spawn_session_reaper(sessions: SessionStore, max_idle: chrono::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let purged = sessions.purge_idle(max_idle);
            if purged > 0 {
                tracing::info!("Expired {} idle session entries", purged);
            }
        }
    });
}
