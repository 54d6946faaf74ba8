use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::database::{self, DatabaseConfig};
use user::{
    config::ServiceConfig,
    endpoint::UserServiceEndpoint,
    password::PasswordHasher,
    repositories::PgUserStore,
    routes,
    service::UserService,
    token::PlaceholderTokenIssuer,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting user service");

    let config = ServiceConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let store = PgUserStore::new(pool);
    if config.run_migrations {
        store.migrate().await?;
    }

    let hasher = PasswordHasher::new(config.hash_cost())?;
    let service = UserService::new(Arc::new(store), hasher);
    let endpoint = UserServiceEndpoint::new(Arc::new(service), Arc::new(PlaceholderTokenIssuer))
        .with_deadline(config.request_timeout());

    let app = routes::create_router(endpoint);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("User service listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("User service shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
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
