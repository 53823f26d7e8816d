use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::ThreadSummary;
use crate::services::message_store::message_from_row;
use crate::thread_key::ThreadKey;

pub struct ThreadDirectory;

impl ThreadDirectory {
    /// Create the directory row on the first message of a pair, or advance
    /// the latest-message pointer on every later one. Runs inside the send
    /// transaction so a failed send never leaves an orphaned update.
    /// Participants are written once, in canonical order, and never altered
    /// by the conflict arm.
    pub async fn upsert(
        tx: &mut Transaction<'_, Postgres>,
        thread_key: &ThreadKey,
        sender_id: Uuid,
        receiver_id: Uuid,
        last_message_id: Uuid,
    ) -> AppResult<()> {
        let mut pair = [sender_id, receiver_id];
        pair.sort_by_key(|id| id.to_string());

        sqlx::query(
            "INSERT INTO chat_threads (thread_key, participant_a, participant_b, last_message_id, last_activity_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (thread_key) DO UPDATE \
             SET last_message_id = EXCLUDED.last_message_id, \
                 last_activity_at = EXCLUDED.last_activity_at",
        )
        .bind(thread_key.as_str())
        .bind(pair[0])
        .bind(pair[1])
        .bind(last_message_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Every thread the identity participates in, newest activity first,
    /// each carrying its latest message and the unread tally scoped to the
    /// identity as receiver. The tally joins against the partial unread
    /// index instead of scanning per-thread history.
    pub async fn list_for_participant(
        db: &Pool<Postgres>,
        participant: Uuid,
        limit: u32,
    ) -> AppResult<Vec<ThreadSummary>> {
        let rows = sqlx::query(
            "SELECT t.thread_key AS t_thread_key, \
                    t.participant_a, \
                    t.participant_b, \
                    m.id, m.thread_key, m.sender_id, m.receiver_id, m.content, m.read, m.created_at, \
                    COALESCE(u.unread, 0)::bigint AS unread_count \
             FROM chat_threads t \
             JOIN messages m ON m.id = t.last_message_id \
             LEFT JOIN ( \
                 SELECT thread_key, COUNT(*) AS unread \
                 FROM messages \
                 WHERE receiver_id = $1 AND NOT read \
                 GROUP BY thread_key \
             ) u ON u.thread_key = t.thread_key \
             WHERE t.participant_a = $1 OR t.participant_b = $1 \
             ORDER BY t.last_activity_at DESC \
             LIMIT $2",
        )
        .bind(participant)
        .bind(i64::from(limit))
        .fetch_all(db)
        .await?;

        let summaries = rows
            .iter()
            .map(|row| ThreadSummary {
                thread_key: ThreadKey::from_stored(row.get("t_thread_key")),
                participant_a: row.get("participant_a"),
                participant_b: row.get("participant_b"),
                latest_message: message_from_row(row),
                unread_count: row.get("unread_count"),
            })
            .collect();
        Ok(summaries)
    }
}
