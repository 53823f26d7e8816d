use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::config::Config;
use crate::error::AppResult;
use crate::fanout::ChannelRegistry;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Postgres>,
    pub registry: ChannelRegistry,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Pool<Postgres>, registry: ChannelRegistry, config: Arc<Config>) -> Self {
        Self {
            db,
            registry,
            config,
        }
    }

    /// Wire the subsystem from configuration: build the pool, apply the
    /// embedded migrations, start with an empty delivery registry.
    pub async fn initialize(config: Config) -> AppResult<Self> {
        let db = crate::db::init_pool(&config.database_url).await?;
        crate::migrations::run_all(&db).await?;
        Ok(Self::new(db, ChannelRegistry::new(), Arc::new(config)))
    }
}
