//! Delivery events and the fan-out entry points.
//!
//! Events are typed values inside the process; the transport collaborator
//! turns them into wire payloads via [`DeliveryEvent::to_payload`]. Event
//! types follow the `object.action` naming convention and serialize to a
//! flat JSON object with `type` and `timestamp` at the top level.

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::fanout::ChannelRegistry;
use crate::models::Message;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum DeliveryEvent {
    /// A new message arrived for the receiving participant.
    #[serde(rename = "message.new")]
    MessageNew { message: Message },

    /// Echo to the sending participant's own sessions that the message was
    /// accepted and persisted.
    #[serde(rename = "message.accepted")]
    MessageAccepted { message: Message },

    /// Some of the sender's messages were marked read; carries the affected
    /// ids and who read them.
    #[serde(rename = "message.read")]
    MessagesRead {
        reader_id: Uuid,
        message_ids: Vec<Uuid>,
    },
}

impl DeliveryEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageNew { .. } => "message.new",
            Self::MessageAccepted { .. } => "message.accepted",
            Self::MessagesRead { .. } => "message.read",
        }
    }

    /// Wire shape: the event fields flattened next to `type`, plus the
    /// delivery timestamp.
    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut payload = serde_json::to_value(self)?;
        if let serde_json::Value::Object(ref mut map) = payload {
            map.insert(
                "timestamp".to_string(),
                serde_json::Value::String(Utc::now().to_rfc3339()),
            );
        }
        Ok(payload)
    }
}

/// Fan out a freshly committed message: `message.new` to the receiver's
/// channels, `message.accepted` back to the sender's, each carrying the full
/// record. Never fails the triggering request; participants with no live
/// channel recover the message from the store on their next fetch.
pub async fn notify_new_message(registry: &ChannelRegistry, message: &Message) {
    let delivered = registry
        .publish(
            message.receiver_id,
            &DeliveryEvent::MessageNew {
                message: message.clone(),
            },
        )
        .await;
    crate::metrics::record_fanout("message.new", delivered as u64);

    let echoed = registry
        .publish(
            message.sender_id,
            &DeliveryEvent::MessageAccepted {
                message: message.clone(),
            },
        )
        .await;
    crate::metrics::record_fanout("message.accepted", echoed as u64);

    tracing::debug!(
        message_id = %message.id,
        thread_key = %message.thread_key,
        delivered,
        echoed,
        "new-message fan-out"
    );
}

/// One `message.read` event per distinct sender whose messages the reader
/// just marked read. Only called after the store mutation committed.
pub async fn notify_read(
    registry: &ChannelRegistry,
    reader_id: Uuid,
    by_sender: &HashMap<Uuid, Vec<Uuid>>,
) {
    for (sender_id, message_ids) in by_sender {
        let delivered = registry
            .publish(
                *sender_id,
                &DeliveryEvent::MessagesRead {
                    reader_id,
                    message_ids: message_ids.clone(),
                },
            )
            .await;
        crate::metrics::record_fanout("message.read", delivered as u64);
        tracing::debug!(
            reader = %reader_id,
            sender = %sender_id,
            receipts = message_ids.len(),
            delivered,
            "read-receipt fan-out"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread_key::ThreadKey;

    fn sample_message() -> Message {
        let sender = Uuid::new_v4();
        let receiver = Uuid::new_v4();
        Message {
            id: Uuid::new_v4(),
            thread_key: ThreadKey::for_pair(sender, receiver),
            sender_id: sender,
            receiver_id: receiver,
            content: "hi".into(),
            read: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn payload_is_flat_and_typed() {
        let message = sample_message();
        let payload = DeliveryEvent::MessageNew {
            message: message.clone(),
        }
        .to_payload()
        .unwrap();

        assert_eq!(payload["type"], "message.new");
        assert!(payload["timestamp"].is_string());
        assert_eq!(payload["message"]["id"], message.id.to_string());
        assert_eq!(payload["message"]["content"], "hi");
        assert_eq!(payload["message"]["read"], false);
    }

    #[test]
    fn read_event_carries_reader_and_ids() {
        let reader_id = Uuid::new_v4();
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let payload = DeliveryEvent::MessagesRead {
            reader_id,
            message_ids: ids.clone(),
        }
        .to_payload()
        .unwrap();

        assert_eq!(payload["type"], "message.read");
        assert_eq!(payload["reader_id"], reader_id.to_string());
        assert_eq!(payload["message_ids"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn event_types_match_serialized_tag() {
        let message = sample_message();
        for event in [
            DeliveryEvent::MessageNew {
                message: message.clone(),
            },
            DeliveryEvent::MessageAccepted { message },
            DeliveryEvent::MessagesRead {
                reader_id: Uuid::new_v4(),
                message_ids: vec![],
            },
        ] {
            let payload = event.to_payload().unwrap();
            assert_eq!(payload["type"], event.event_type());
        }
    }

    #[tokio::test]
    async fn notify_new_message_reaches_both_sides() {
        let registry = ChannelRegistry::new();
        let message = sample_message();
        let (_hr, mut receiver_rx) = registry.subscribe(message.receiver_id).await;
        let (_hs, mut sender_rx) = registry.subscribe(message.sender_id).await;

        notify_new_message(&registry, &message).await;

        assert!(matches!(
            receiver_rx.try_recv().unwrap(),
            DeliveryEvent::MessageNew { .. }
        ));
        assert!(matches!(
            sender_rx.try_recv().unwrap(),
            DeliveryEvent::MessageAccepted { .. }
        ));
    }

    #[tokio::test]
    async fn notify_read_targets_each_sender_once() {
        let registry = ChannelRegistry::new();
        let reader = Uuid::new_v4();
        let sender_a = Uuid::new_v4();
        let sender_b = Uuid::new_v4();
        let (_ha, mut rx_a) = registry.subscribe(sender_a).await;
        let (_hb, mut rx_b) = registry.subscribe(sender_b).await;

        let mut by_sender = HashMap::new();
        by_sender.insert(sender_a, vec![Uuid::new_v4(), Uuid::new_v4()]);
        by_sender.insert(sender_b, vec![Uuid::new_v4()]);

        notify_read(&registry, reader, &by_sender).await;

        match rx_a.try_recv().unwrap() {
            DeliveryEvent::MessagesRead {
                reader_id,
                message_ids,
            } => {
                assert_eq!(reader_id, reader);
                assert_eq!(message_ids.len(), 2);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx_a.try_recv().is_err());

        match rx_b.try_recv().unwrap() {
            DeliveryEvent::MessagesRead { message_ids, .. } => {
                assert_eq!(message_ids.len(), 1)
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
