use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Referential-integrity boundary against the identity records owned by the
/// user service. Sends and reads with identities that resolve to no record
/// are rejected here, before any message state is touched; the schema's
/// foreign keys back the same rule at the storage layer.
pub struct IdentityDirectory;

impl IdentityDirectory {
    pub async fn ensure_known(db: &Pool<Postgres>, id: Uuid) -> AppResult<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(db)
            .await?;
        if exists {
            Ok(())
        } else {
            tracing::debug!(identity = %id, "identity resolves to no record");
            Err(AppError::NotFound)
        }
    }
}
