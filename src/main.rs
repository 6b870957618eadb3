use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use storefront_gateway::{
    AppState, DirectoryState, InMemoryDirectory, NotificationBridge, PostgresDirectory,
    config::{AppConfig, Env},
    create_router,
    routes::RouteGroups,
};
use tokio::{net::TcpListener, sync::broadcast};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Start-up sequence: configuration, logging, employee directory, notification
/// channel, router, server. The channel is bound before the listener accepts its
/// first connection, so no request can observe an unbound bridge.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise a development-friendly default.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storefront_gateway=debug,tower_http=info,axum=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Gateway starting in {:?} mode", config.env);

    // 3. Employee directory
    let directory: DirectoryState = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
            Arc::new(PostgresDirectory::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using an empty in-memory employee directory");
            Arc::new(InMemoryDirectory::new())
        }
    };

    // 4. Notification channel, bound before serving.
    let notifier = NotificationBridge::new();
    let (channel, _) = broadcast::channel(config.event_capacity);
    notifier.bind(channel);

    // 5. Router
    let port = config.port;
    let state = AppState {
        directory,
        notifier,
        config,
    };
    let app = create_router(state, RouteGroups::default())
        .expect("FATAL: invalid route table");

    // 6. Server
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: cannot bind {addr}: {e}"));

    tracing::info!("Listening on {addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server terminated");
    }
}
