//! Request-level surface of the messaging subsystem.
//!
//! The transport collaborator (HTTP routes, RPC handlers, ...) calls these
//! with an [`AuthContext`] it built from the verified credential. Every
//! operation checks authorization and input shape before touching the store,
//! and fan-out only ever runs after the corresponding store mutation has
//! committed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{AppError, AppResult};
use crate::fanout::events;
use crate::models::{Message, ThreadSummary};
use crate::services::identity::IdentityDirectory;
use crate::services::message_store::MessageStore;
use crate::services::thread_directory::ThreadDirectory;
use crate::state::AppState;
use crate::thread_key::ThreadKey;

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

/// Persist a message and fan it out to both participants.
///
/// Sender and receiver must both resolve to identity records; a sender
/// messaging themselves is allowed and lands in the degenerate self-thread.
/// The message insert and the thread-directory upsert share one transaction,
/// so a failed send never leaves an orphaned directory update.
pub async fn send_message(
    state: &AppState,
    auth: &AuthContext,
    req: SendMessageRequest,
) -> AppResult<Message> {
    auth.require()?;

    if req.content.trim().is_empty() {
        return Err(AppError::Validation(
            "message content must not be empty".into(),
        ));
    }
    IdentityDirectory::ensure_known(&state.db, req.sender_id).await?;
    if req.receiver_id != req.sender_id {
        IdentityDirectory::ensure_known(&state.db, req.receiver_id).await?;
    }

    let thread_key = ThreadKey::for_pair(req.sender_id, req.receiver_id);

    let mut tx = state.db.begin().await?;
    let message = MessageStore::append(
        &mut tx,
        &thread_key,
        req.sender_id,
        req.receiver_id,
        &req.content,
    )
    .await?;
    ThreadDirectory::upsert(
        &mut tx,
        &thread_key,
        req.sender_id,
        req.receiver_id,
        message.id,
    )
    .await?;
    tx.commit().await?;

    crate::metrics::record_message_sent();
    tracing::info!(
        message_id = %message.id,
        thread_key = %thread_key,
        "message persisted"
    );

    // Delivery is best-effort and runs strictly after commit.
    events::notify_new_message(&state.registry, &message).await;

    Ok(message)
}

/// Every thread the caller participates in, newest activity first, each
/// annotated with its latest message and the caller's unread tally.
pub async fn get_thread_list(
    state: &AppState,
    auth: &AuthContext,
    limit: Option<u32>,
) -> AppResult<Vec<ThreadSummary>> {
    let caller = auth.require()?;
    IdentityDirectory::ensure_known(&state.db, caller).await?;

    let limit = limit.unwrap_or(state.config.thread_list_limit).max(1);
    ThreadDirectory::list_for_participant(&state.db, caller, limit).await
}

/// One page of the conversation between the caller and `other_id`, returned
/// oldest-first.
///
/// Fetching history implicitly marks the thread read for the caller as
/// receiver, in a detached task, so a failed mark can never block or fail
/// the read itself. The matching read-receipt fan-out happens inside that
/// task, after its UPDATE commits.
pub async fn get_history(
    state: &AppState,
    auth: &AuthContext,
    other_id: Uuid,
    page: u32,
    page_size: Option<u32>,
) -> AppResult<HistoryPage> {
    let caller = auth.require()?;
    IdentityDirectory::ensure_known(&state.db, caller).await?;
    if other_id != caller {
        IdentityDirectory::ensure_known(&state.db, other_id).await?;
    }

    let thread_key = ThreadKey::for_pair(caller, other_id);
    let page = page.max(1);
    let page_size = page_size
        .unwrap_or(state.config.history_page_size)
        .clamp(1, crate::config::HISTORY_PAGE_CAP);

    let messages = MessageStore::history(&state.db, &thread_key, page, page_size).await?;
    let total = MessageStore::count_in_thread(&state.db, &thread_key).await?;

    spawn_mark_thread_read(state.clone(), thread_key, caller);

    let total_pages = (total as u64).div_ceil(u64::from(page_size)) as u32;
    Ok(HistoryPage {
        messages,
        total,
        page,
        page_size,
        total_pages,
    })
}

/// Mark an explicit batch of messages read for the caller as receiver.
///
/// Ids the caller does not own, already-read ids, and unknown ids are
/// silently skipped; the returned count is the number of messages that
/// actually changed state. Only a structurally empty batch is an error.
pub async fn mark_read(
    state: &AppState,
    auth: &AuthContext,
    message_ids: &[Uuid],
) -> AppResult<u64> {
    let caller = auth.require()?;
    if message_ids.is_empty() {
        return Err(AppError::Validation(
            "message id batch must not be empty".into(),
        ));
    }

    let outcome = MessageStore::mark_read(&state.db, message_ids, caller).await?;
    if outcome.modified > 0 {
        crate::metrics::record_read_receipts(outcome.modified);
        events::notify_read(&state.registry, caller, &outcome.by_sender).await;
    }
    Ok(outcome.modified)
}

/// Total unread messages addressed to the caller, across all threads.
pub async fn get_unread_count(state: &AppState, auth: &AuthContext) -> AppResult<i64> {
    let caller = auth.require()?;
    IdentityDirectory::ensure_known(&state.db, caller).await?;
    MessageStore::count_unread(&state.db, caller).await
}

/// Detached side of the implicit read-marking pipeline. Failures are logged
/// and swallowed; the history response has already been produced.
fn spawn_mark_thread_read(state: AppState, thread_key: ThreadKey, caller: Uuid) {
    tokio::spawn(async move {
        match MessageStore::mark_thread_read(&state.db, &thread_key, caller).await {
            Ok(outcome) if outcome.modified > 0 => {
                crate::metrics::record_read_receipts(outcome.modified);
                events::notify_read(&state.registry, caller, &outcome.by_sender).await;
                tracing::debug!(
                    thread_key = %thread_key,
                    reader = %caller,
                    modified = outcome.modified,
                    "thread marked read on fetch"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    thread_key = %thread_key,
                    reader = %caller,
                    error = %e,
                    "implicit read-marking failed"
                );
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fanout::ChannelRegistry;
    use std::sync::Arc;

    // connect_lazy never touches the network, which is exactly the point:
    // these tests prove the pre-store guards reject before any I/O happens.
    fn detached_state() -> AppState {
        let db = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unreachable")
            .expect("lazy pool");
        AppState::new(
            db,
            ChannelRegistry::new(),
            Arc::new(Config::test_defaults()),
        )
    }

    #[tokio::test]
    async fn send_requires_authentication() {
        let state = detached_state();
        let req = SendMessageRequest {
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            content: "hello".into(),
        };
        let err = send_message(&state, &AuthContext::anonymous(), req)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn send_rejects_empty_content_before_store_access() {
        let state = detached_state();
        let sender = Uuid::new_v4();
        let req = SendMessageRequest {
            sender_id: sender,
            receiver_id: Uuid::new_v4(),
            content: "   ".into(),
        };
        let err = send_message(&state, &AuthContext::verified(sender), req)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn mark_read_rejects_empty_batch() {
        let state = detached_state();
        let caller = Uuid::new_v4();
        let err = mark_read(&state, &AuthContext::verified(caller), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn every_read_operation_requires_authentication() {
        let state = detached_state();
        let anon = AuthContext::anonymous();
        assert!(matches!(
            get_thread_list(&state, &anon, None).await.unwrap_err(),
            AppError::Unauthorized
        ));
        assert!(matches!(
            get_history(&state, &anon, Uuid::new_v4(), 1, None)
                .await
                .unwrap_err(),
            AppError::Unauthorized
        ));
        assert!(matches!(
            mark_read(&state, &anon, &[Uuid::new_v4()]).await.unwrap_err(),
            AppError::Unauthorized
        ));
        assert!(matches!(
            get_unread_count(&state, &anon).await.unwrap_err(),
            AppError::Unauthorized
        ));
    }
}
