// src/main.rs

use comment_engine::config::Config;
use comment_engine::models::event::CommentEvent;
use comment_engine::routes;
use comment_engine::services::collaborators::ChannelEventSink;
use comment_engine::services::counter_sync::CounterSync;
use comment_engine::services::database;
use comment_engine::state::AppState;
use dotenvy::dotenv;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const RESYNC_BATCH_SIZE: i64 = 500;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env()?;

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

    // Initialize Database Pool with Retry
    let connect_options = database::connect_options(&config.database_url)?;
    let mut retry_count = 0;
    let pool = loop {
        match SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(connect_options.clone())
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    tracing::error!("Failed to connect to database after 5 retries: {}", e);
                    return Err(e.into());
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied successfully.");

    // Notification side: drain events after commit
    let (events, receiver) = ChannelEventSink::new();
    tokio::spawn(deliver_events(receiver));

    if let Some(secs) = config.comments.resync_interval_secs {
        tokio::spawn(resync_sweep(pool.clone(), Duration::from_secs(secs)));
    }

    // Create AppState
    let state = AppState::new(pool.clone(), config.clone(), Arc::new(events));

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Start the server
    axum::serve(listener, app).await?;
    Ok(())
}

/// Hands events to the notification collaborator. Delivery is out of process,
/// so here they are only logged.
async fn deliver_events(mut receiver: UnboundedReceiver<CommentEvent>) {
    while let Some(event) = receiver.recv().await {
        tracing::info!(?event, "Comment event");
    }
}

/// Periodic counter repair. Failures are logged and retried on the next tick.
async fn resync_sweep(pool: SqlitePool, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match CounterSync::resync_all(&pool, RESYNC_BATCH_SIZE).await {
            Ok(visited) => tracing::info!(visited, "Counter resync sweep done"),
            Err(e) => tracing::warn!("Counter resync sweep failed: {}", e),
        }
    }
}
