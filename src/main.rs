use accountgate::{
    config::{AppConfig, SessionConfig},
    db, routes, services, AppState,
};

use anyhow::Context;
use std::net::SocketAddr;
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "accountgate=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    config
        .validate_production()
        .context("Refusing to start with an insecure production configuration")?;
    tracing::info!(environment = %config.environment, "Configuration loaded");

    // Database connection
    let pool = db::create_pool(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    // Run migrations
    db::run_migrations(&pool).await?;

    let email_service = services::create_email_service(config.smtp.as_ref())?;

    let app_state = AppState::new(pool.clone(), &config, email_service);

    // Session store
    let session_store = SqliteStore::new(pool.clone())
        .with_table_name("sessions")
        .map_err(|e| anyhow::anyhow!("Invalid session table name: {}", e))?;
    session_store.migrate().await?;

    let session_layer = SessionConfig::from_app_config(&config).create_layer(session_store);

    let app = routes::build_router(app_state).layer(session_layer);

    let addr = SocketAddr::from((
        config
            .host
            .parse::<std::net::IpAddr>()
            .with_context(|| format!("Invalid HOST {}", config.host))?,
        config.port,
    ));

    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
