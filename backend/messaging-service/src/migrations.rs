use sqlx::{Pool, Postgres};

// Embed SQL migrations at compile time for deterministic startup
const MIG_0001: &str = include_str!("../migrations/0001_create_users.sql");
const MIG_0002: &str = include_str!("../migrations/0002_create_messages.sql");
const MIG_0003: &str = include_str!("../migrations/0003_create_chat_threads.sql");

/// Apply all embedded migrations in order. Every statement is IF NOT EXISTS,
/// so re-running against an up-to-date database is a no-op.
pub async fn run_all(db: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    for (i, sql) in [MIG_0001, MIG_0002, MIG_0003].into_iter().enumerate() {
        let label = i + 1;
        sqlx::raw_sql(sql).execute(db).await.map_err(|e| {
            tracing::error!(migration = %label, error = %e, "messaging migration failed");
            e
        })?;
        tracing::info!(migration = %label, "messaging migration applied");
    }
    Ok(())
}
