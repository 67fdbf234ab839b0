// src/main.rs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use mastery_tracker::config::{Config, StorageBackend};
use mastery_tracker::error::AppError;
use mastery_tracker::routes;
use mastery_tracker::services::MasteryTracker;
use mastery_tracker::state::AppState;
use mastery_tracker::store::{
    MemoryProgressStore, MemorySubjectResolver, PgProgressStore, PgSubjectResolver,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if present)
    dotenv().ok();

    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily("logs", "mastery.log");
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

    let tracker = match config.storage {
        StorageBackend::Postgres => {
            let pool = connect_with_retry(&config).await?;

            tracing::info!("Running migrations...");
            sqlx::migrate!("./migrations").run(&pool).await.map_err(AppError::from)?;
            tracing::info!("Migrations applied successfully.");

            MasteryTracker::new(
                Arc::new(PgProgressStore::new(pool.clone())),
                Arc::new(PgSubjectResolver::new(pool)),
            )
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; progress is lost on shutdown");
            let subjects = MemorySubjectResolver::new();
            for subject in &config.memory_subjects {
                subjects.insert(subject.clone()).await;
            }
            tracing::info!("Loaded {} subject(s) into the catalog", config.memory_subjects.len());
            MasteryTracker::new(Arc::new(MemoryProgressStore::new()), Arc::new(subjects))
        }
    };

    let state = AppState { tracker };

    let app = routes::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Connects to Postgres, retrying while the database comes up.
async fn connect_with_retry(config: &Config) -> Result<PgPool, AppError> {
    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| AppError::InvalidArgument("DATABASE_URL must be set".to_string()))?;

    let mut retry_count = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                tracing::info!("Database connected...");
                return Ok(pool);
            }
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    tracing::error!("Failed to connect to database after 5 retries: {}", e);
                    return Err(AppError::from(e));
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
