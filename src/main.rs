use anyhow::Context;
use equipment_lending::{
    adapters::postgres::{PostgresActivityLog, PostgresLendingStore, PostgresLoanQueries},
    api::{handlers::AppState, router::create_router},
    application::loan::ServiceDependencies,
    config::AppConfig,
    scheduler,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before reading configuration
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "equipment_lending={},tower_http=debug",
            config.logging.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting equipment-lending v{}", env!("CARGO_PKG_VERSION"));

    // Initialize database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    // Initialize adapters
    let service_deps = ServiceDependencies {
        lending_store: Arc::new(PostgresLendingStore::new(pool.clone())),
        loan_queries: Arc::new(PostgresLoanQueries::new(pool.clone())),
        activity_log: Arc::new(PostgresActivityLog::new(pool.clone())),
    };

    // Daily stale-request sweep
    let sweeper = if config.lending.sweep_enabled {
        let at = config.lending.sweep_time()?;
        tracing::info!(sweep_at = %at, "Stale request sweep enabled");
        Some(scheduler::spawn_daily_sweep(service_deps.clone(), at))
    } else {
        tracing::info!("Stale request sweep disabled");
        None
    };

    let app_state = Arc::new(AppState {
        service_deps,
        jwt_secret: config.auth.jwt_secret.clone(),
        page_size: config.lending.page_size,
    });

    let app = create_router(app_state);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
