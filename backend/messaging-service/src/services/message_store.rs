use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::config::HISTORY_PAGE_CAP;
use crate::error::AppResult;
use crate::models::Message;
use crate::thread_key::ThreadKey;

/// Result of a batch read-state transition: how many rows actually flipped,
/// and the affected message ids grouped by original sender (the fan-out
/// needs one receipt event per sender).
#[derive(Debug, Default)]
pub struct ReadOutcome {
    pub modified: u64,
    pub by_sender: HashMap<Uuid, Vec<Uuid>>,
}

pub struct MessageStore;

impl MessageStore {
    /// Persist one message inside the send transaction. `read` defaults to
    /// false and the timestamp is assigned by the database so concurrent
    /// senders order consistently.
    pub async fn append(
        tx: &mut Transaction<'_, Postgres>,
        thread_key: &ThreadKey,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
    ) -> AppResult<Message> {
        let id = Uuid::new_v4();
        let row = sqlx::query(
            "INSERT INTO messages (id, thread_key, sender_id, receiver_id, content) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING created_at",
        )
        .bind(id)
        .bind(thread_key.as_str())
        .bind(sender_id)
        .bind(receiver_id)
        .bind(content)
        .fetch_one(&mut **tx)
        .await?;
        let created_at: DateTime<Utc> = row.get("created_at");

        Ok(Message {
            id,
            thread_key: thread_key.clone(),
            sender_id,
            receiver_id,
            content: content.to_string(),
            read: false,
            created_at,
        })
    }

    /// One page of a thread's history. Queried newest-first so the offset
    /// counts back from the latest message, then reversed so the returned
    /// page reads oldest-first. A page past the end is empty, not an error.
    pub async fn history(
        db: &Pool<Postgres>,
        thread_key: &ThreadKey,
        page: u32,
        page_size: u32,
    ) -> AppResult<Vec<Message>> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, HISTORY_PAGE_CAP);
        let offset = i64::from(page - 1) * i64::from(page_size);

        let rows = sqlx::query(
            "SELECT id, thread_key, sender_id, receiver_id, content, read, created_at \
             FROM messages \
             WHERE thread_key = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(thread_key.as_str())
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(db)
        .await?;

        let mut out: Vec<Message> = rows.iter().map(message_from_row).collect();
        out.reverse();
        Ok(out)
    }

    /// Fetch the subset of the given ids that exist; missing ids are
    /// silently skipped.
    pub async fn find_by_ids(db: &Pool<Postgres>, ids: &[Uuid]) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, thread_key, sender_id, receiver_id, content, read, created_at \
             FROM messages \
             WHERE id = ANY($1) \
             ORDER BY created_at, id",
        )
        .bind(ids)
        .fetch_all(db)
        .await?;
        Ok(rows.iter().map(message_from_row).collect())
    }

    /// Flip read=false -> true for the given ids where the caller is the
    /// receiver. One atomic UPDATE; rows that do not match (wrong receiver,
    /// already read, nonexistent id) are skipped, never an error.
    pub async fn mark_read(
        db: &Pool<Postgres>,
        ids: &[Uuid],
        as_receiver: Uuid,
    ) -> AppResult<ReadOutcome> {
        let rows = sqlx::query(
            "UPDATE messages SET read = TRUE \
             WHERE id = ANY($1) AND receiver_id = $2 AND NOT read \
             RETURNING id, sender_id",
        )
        .bind(ids)
        .bind(as_receiver)
        .fetch_all(db)
        .await?;
        Ok(outcome_from_rows(rows))
    }

    /// Same transition scoped to every unread message in one thread
    /// addressed to the caller.
    pub async fn mark_thread_read(
        db: &Pool<Postgres>,
        thread_key: &ThreadKey,
        as_receiver: Uuid,
    ) -> AppResult<ReadOutcome> {
        let rows = sqlx::query(
            "UPDATE messages SET read = TRUE \
             WHERE thread_key = $1 AND receiver_id = $2 AND NOT read \
             RETURNING id, sender_id",
        )
        .bind(thread_key.as_str())
        .bind(as_receiver)
        .fetch_all(db)
        .await?;
        Ok(outcome_from_rows(rows))
    }

    /// Total unread messages addressed to the identity, across all threads.
    pub async fn count_unread(db: &Pool<Postgres>, for_receiver: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)::bigint FROM messages WHERE receiver_id = $1 AND NOT read",
        )
        .bind(for_receiver)
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    /// Total messages in one thread (history page metadata).
    pub async fn count_in_thread(db: &Pool<Postgres>, thread_key: &ThreadKey) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*)::bigint FROM messages WHERE thread_key = $1")
                .bind(thread_key.as_str())
                .fetch_one(db)
                .await?;
        Ok(count)
    }
}

fn outcome_from_rows(rows: Vec<PgRow>) -> ReadOutcome {
    let mut outcome = ReadOutcome {
        modified: rows.len() as u64,
        by_sender: HashMap::new(),
    };
    for row in rows {
        let id: Uuid = row.get("id");
        let sender_id: Uuid = row.get("sender_id");
        outcome.by_sender.entry(sender_id).or_default().push(id);
    }
    outcome
}

pub(crate) fn message_from_row(row: &PgRow) -> Message {
    Message {
        id: row.get("id"),
        thread_key: ThreadKey::from_stored(row.get("thread_key")),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        content: row.get("content"),
        read: row.get("read"),
        created_at: row.get("created_at"),
    }
}
