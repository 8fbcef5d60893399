use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use visitor_id::api::{self, AppState};
use visitor_id::browser::FixedClassifier;
use visitor_id::config::{Config, DatabaseBackend};
use visitor_id::geo::{GeoResolver, MaxMindLookup};
use visitor_id::matcher::VisitorMatcher;
use visitor_id::storage::{CachedStorage, PostgresStorage, SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("visitor_id=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Open the geolocation dataset
    let geo_lookup = MaxMindLookup::open(&config.geoip.db_path)
        .with_context(|| format!("Failed to load GeoIP database {}", config.geoip.db_path))?;
    info!("🌍 GeoIP database loaded from {}", config.geoip.db_path);

    // Initialize storage
    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            let url = config.database.sqlite_url();
            info!("Using SQLite storage: {}", url);
            Arc::new(SqliteStorage::new(url, config.database.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            let options = config.database.postgres_options()?;
            info!(
                "Using PostgreSQL storage: {}:{}",
                options.get_host(),
                options.get_port()
            );
            Arc::new(
                PostgresStorage::with_options(options, config.database.max_connections).await?,
            )
        }
    };

    // Initialize database
    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    let storage: Arc<dyn Storage> = if config.cache.enabled() {
        info!(
            "Visitor cache enabled (max entries: {}, ttl: {}s)",
            config.cache.max_entries, config.cache.ttl_secs
        );
        Arc::new(CachedStorage::new(
            storage,
            config.cache.max_entries,
            config.cache.ttl_secs,
        ))
    } else {
        storage
    };

    let state = Arc::new(AppState {
        geo: GeoResolver::new(Arc::new(geo_lookup)),
        classifier: Arc::new(FixedClassifier::default()),
        matcher: VisitorMatcher::new(storage),
    });

    let router = api::create_api_router(
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Visitor id server listening on http://{}", addr);
    info!("   - GET http://{}/user-id?fingerPrint=..&ip=..&userAgent=..", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received");
}
