use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use portal::{
    AppState,
    config::{DirectoryBackend, PortalConfig, SessionStoreBackend},
    directory::{PgDirectory, ProfileDirectory, RestDirectory},
    portal::PortalRegistry,
    provider::GoTrueFactory,
    routes,
    storage::{MemorySessionStorage, RedisSessionStorage, SessionStorage},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting portal service");

    let config = PortalConfig::from_env()?;

    let storage: Arc<dyn SessionStorage> = match config.session_store {
        SessionStoreBackend::Memory => Arc::new(MemorySessionStorage::new()),
        SessionStoreBackend::Redis => {
            let redis_config = common::cache::RedisConfig::from_env()?;
            let redis_pool = common::cache::RedisPool::new(&redis_config).await?;
            if !redis_pool.health_check().await? {
                anyhow::bail!("Failed to connect to Redis");
            }
            Arc::new(RedisSessionStorage::new(
                redis_pool,
                config.provider.session_ttl_secs,
            ))
        }
    };
    info!("Persisting sessions in {}", storage.name());

    let directory: Arc<dyn ProfileDirectory> = match config.directory {
        DirectoryBackend::Rest => Arc::new(RestDirectory::new(config.provider.clone())?),
        DirectoryBackend::Postgres => {
            let db_config = common::database::DatabaseConfig::from_env()?;
            let pool = common::database::init_pool(&db_config).await?;
            if !common::database::health_check(&pool).await? {
                anyhow::bail!("Failed to connect to database");
            }
            Arc::new(PgDirectory::new(pool))
        }
    };
    info!("Reading role records through {}", directory.name());

    let factory = GoTrueFactory::new(config.provider.clone(), storage)?;
    let portals = PortalRegistry::new(Arc::new(factory), directory);
    portals.spawn_sweeper(config.idle_timeout());

    let app_state = AppState {
        portals,
        cookie_name: config.cookie_name.clone(),
        loading_wait: config.loading_wait(),
        refresh_margin_secs: config.provider.refresh_margin_secs,
    };

    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Portal service listening on {}", config.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
