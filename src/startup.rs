use crate::shutdown;
use calchat::config::Config;
use calchat::error::{config_error, Error};
use calchat::store::{PgUserStore, RedisSessionStore, SessionStore, UserStore};
use calchat::web::{router, AppState};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| config_error(&format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the application config
pub fn load_config() -> miette::Result<Config> {
    match Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Connect the stores, serve HTTP and release the pool on shutdown
pub async fn run_server(config: Config) -> miette::Result<()> {
    for provider in ["google", "outlook"] {
        if !config.is_provider_configured(provider) {
            warn!("No OAuth credentials for {}, sign in with it is disabled", provider);
        }
    }

    let pg = PgUserStore::connect(&config.database_url).await?;
    pg.migrate().await?;
    let sessions = RedisSessionStore::connect(&config.redis_url).await?;

    let addr = format!("{}:{}", config.host, config.port);
    let users: Arc<dyn UserStore> = Arc::new(pg.clone());
    let sessions: Arc<dyn SessionStore> = Arc::new(sessions);
    let state = AppState::new(config, users, sessions)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(Error::Io)?;
    info!("Listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::wait_for_signal())
        .await;

    pg.close().await;

    served.map_err(Error::Io)?;
    info!("Server stopped");
    Ok(())
}
