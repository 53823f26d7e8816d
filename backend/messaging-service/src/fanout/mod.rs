use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod events;

pub use events::DeliveryEvent;

struct Channel {
    id: Uuid,
    tx: UnboundedSender<DeliveryEvent>,
}

/// Live delivery channels keyed by participant identity. An identity may
/// hold any number of channels (devices, tabs); fan-out targets all of them.
/// Delivery is best-effort with no queueing or retries; anything missed is
/// recovered from the durable store on the next fetch.
#[derive(Default, Clone)]
pub struct ChannelRegistry {
    inner: Arc<RwLock<HashMap<Uuid, Vec<Channel>>>>,
}

/// Returned by [`ChannelRegistry::subscribe`]; identifies exactly one
/// channel for later deregistration.
#[derive(Debug)]
pub struct ChannelHandle {
    identity: Uuid,
    channel_id: Uuid,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(
        &self,
        identity: Uuid,
    ) -> (ChannelHandle, UnboundedReceiver<DeliveryEvent>) {
        let (tx, rx) = unbounded_channel();
        let channel_id = Uuid::new_v4();
        let mut guard = self.inner.write().await;
        guard
            .entry(identity)
            .or_default()
            .push(Channel { id: channel_id, tx });
        (
            ChannelHandle {
                identity,
                channel_id,
            },
            rx,
        )
    }

    pub async fn unsubscribe(&self, handle: ChannelHandle) {
        let mut guard = self.inner.write().await;
        if let Some(list) = guard.get_mut(&handle.identity) {
            list.retain(|c| c.id != handle.channel_id);
            if list.is_empty() {
                guard.remove(&handle.identity);
            }
        }
    }

    /// Push an event to every live channel of the identity. Channels whose
    /// subscriber went away are pruned. Returns how many channels accepted
    /// the event; zero subscribers is a normal outcome, not an error.
    pub async fn publish(&self, identity: Uuid, event: &DeliveryEvent) -> usize {
        let mut guard = self.inner.write().await;
        let Some(list) = guard.get_mut(&identity) else {
            return 0;
        };
        let before = list.len();
        list.retain(|c| c.tx.send(event.clone()).is_ok());
        let delivered = list.len();
        if delivered < before {
            crate::metrics::record_dropped_channels((before - delivered) as u64);
            tracing::debug!(
                identity = %identity,
                dropped = before - delivered,
                "pruned closed delivery channels"
            );
        }
        if list.is_empty() {
            guard.remove(&identity);
        }
        delivered
    }

    pub async fn channel_count(&self, identity: Uuid) -> usize {
        let guard = self.inner.read().await;
        guard.get(&identity).map(Vec::len).unwrap_or(0)
    }
}
