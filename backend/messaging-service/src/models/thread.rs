use serde::Serialize;
use uuid::Uuid;

use crate::models::Message;
use crate::thread_key::ThreadKey;

/// One entry of the per-participant thread list: the thread, its latest
/// message, and the unread tally scoped to the requesting participant as
/// receiver. Participant ids are included so the presentation layer can
/// resolve display names without another round trip.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadSummary {
    pub thread_key: ThreadKey,
    pub participant_a: Uuid,
    pub participant_b: Uuid,
    pub latest_message: Message,
    pub unread_count: i64,
}
