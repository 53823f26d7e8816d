use db_pool::{create_pool as create_pg_pool, DbConfig as DbPoolConfig};
use sqlx::{Pool, Postgres};

pub async fn init_pool(database_url: &str) -> Result<Pool<Postgres>, sqlx::Error> {
    let mut cfg = DbPoolConfig::from_env("messaging-service")
        .unwrap_or_else(|_| DbPoolConfig::with_url("messaging-service", database_url));
    if cfg.database_url.is_empty() {
        cfg.database_url = database_url.to_string();
    }
    create_pg_pool(cfg).await
}
