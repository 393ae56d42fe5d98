use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use futures::future::join_all;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::event::WireFrame;

pub type SubscriberId = Uuid;

/// `orderId -> set of live subscriber channels`, plus the reverse lookup
/// needed to unregister a channel in O(1) on disconnect.
#[derive(Clone, Default)]
pub struct PushRegistry {
    by_order: Arc<DashMap<Uuid, DashSet<SubscriberId>>>,
    channels: Arc<DashMap<SubscriberId, mpsc::Sender<String>>>,
    owner: Arc<DashMap<SubscriberId, Uuid>>,
}

impl PushRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber channel for `order_id`. Returns the
    /// subscriber id the caller should hold onto in order to `unregister`
    /// later (e.g. on socket close).
    pub fn register(&self, order_id: Uuid, sender: mpsc::Sender<String>) -> SubscriberId {
        let subscriber_id = Uuid::new_v4();
        self.channels.insert(subscriber_id, sender);
        self.owner.insert(subscriber_id, order_id);
        self.by_order
            .entry(order_id)
            .or_insert_with(DashSet::new)
            .insert(subscriber_id);

        tracing::debug!(%order_id, %subscriber_id, "subscriber registered");
        subscriber_id
    }

    pub fn unregister(&self, subscriber_id: SubscriberId) {
        self.channels.remove(&subscriber_id);
        if let Some((_, order_id)) = self.owner.remove(&subscriber_id) {
            if let Some(set) = self.by_order.get(&order_id) {
                set.remove(&subscriber_id);
                let now_empty = set.is_empty();
                drop(set);
                if now_empty {
                    self.by_order.remove(&order_id);
                }
            }
        }
    }

    /// Fan a frame out to every channel registered for `order_id`. Channels
    /// whose send fails (full buffer past backpressure, or a closed
    /// receiver) are unregistered and counted as a miss, not an error.
    /// Returns the number of successful deliveries.
    pub async fn emit(&self, order_id: Uuid, frame: &WireFrame) -> usize {
        let subscribers: Vec<SubscriberId> = match self.by_order.get(&order_id) {
            Some(set) => set.iter().map(|s| *s).collect(),
            None => return 0,
        };

        let body = match frame.to_json() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(%order_id, error = %e, "failed to serialize wire frame");
                return 0;
            }
        };

        let sends: Vec<_> = subscribers
            .into_iter()
            .filter_map(|subscriber_id| {
                let sender = self.channels.get(&subscriber_id)?.clone();
                let body = body.clone();
                Some(async move {
                    match sender.send(body).await {
                        Ok(()) => None,
                        Err(_) => Some(subscriber_id),
                    }
                })
            })
            .collect();
        let attempted = sends.len();

        let dead: Vec<SubscriberId> = join_all(sends).await.into_iter().flatten().collect();
        let delivered = attempted - dead.len();

        for subscriber_id in dead {
            self.unregister(subscriber_id);
        }

        delivered
    }

    pub fn subscriber_count(&self, order_id: Uuid) -> usize {
        self.by_order.get(&order_id).map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::order::OrderStatus;
    use crate::models::event::StatusEvent;

    fn status_frame(order_id: Uuid) -> WireFrame {
        WireFrame::StatusUpdate(StatusEvent {
            order_id,
            status: OrderStatus::Pending,
            dex_type: None,
            executed_price: None,
            tx_hash: None,
            error_reason: None,
            timestamp: chrono::Utc::now(),
        })
    }

    #[tokio::test]
    async fn emit_with_no_subscribers_returns_zero() {
        let registry = PushRegistry::new();
        let order_id = Uuid::new_v4();
        assert_eq!(registry.emit(order_id, &status_frame(order_id)).await, 0);
    }

    #[tokio::test]
    async fn fan_out_to_multiple_subscribers() {
        let registry = PushRegistry::new();
        let order_id = Uuid::new_v4();

        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        registry.register(order_id, tx1);
        registry.register(order_id, tx2);

        let delivered = registry.emit(order_id, &status_frame(order_id)).await;
        assert_eq!(delivered, 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn dead_channel_is_unregistered_on_send_failure() {
        let registry = PushRegistry::new();
        let order_id = Uuid::new_v4();

        let (tx, rx) = mpsc::channel(8);
        registry.register(order_id, tx);
        drop(rx);

        let delivered = registry.emit(order_id, &status_frame(order_id)).await;
        assert_eq!(delivered, 0);
        assert_eq!(registry.subscriber_count(order_id), 0);
    }
}
