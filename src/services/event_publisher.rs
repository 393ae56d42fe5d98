use std::time::Duration;

use uuid::Uuid;

use crate::models::event::StatusEvent;
use crate::models::order::OrderStatus;
use crate::queue::{OrderQueue, QueueJob};
use crate::redis::RedisPool;

use super::resource_manager::PerOrderResourceManager;

const MAX_ATTEMPTS: u32 = 3;
const DEDUPE_WINDOW: Duration = Duration::from_secs(24 * 3600);

pub fn status_queue_name(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "status/pending",
        OrderStatus::Routing => "status/routing",
        OrderStatus::Building => "status/building",
        OrderStatus::Submitted => "status/submitted",
        OrderStatus::Confirmed => "status/confirmed",
        OrderStatus::Failed => "status/failed",
    }
}

/// Converts `StatusEvent`s into durable entries on the per-status queue for
/// the emitting order. Never blocks lifecycle progress: publish failures are
/// logged and dropped, with the persisted row remaining the source of truth.
#[derive(Clone)]
pub struct EventPublisher {
    redis: RedisPool,
    resources: PerOrderResourceManager,
}

impl EventPublisher {
    pub fn new(redis: RedisPool, resources: PerOrderResourceManager) -> Self {
        Self { redis, resources }
    }

    pub async fn publish(&self, event: StatusEvent) {
        let order_id = event.order_id;

        if !self.resources.has_resources(order_id) {
            tracing::warn!(%order_id, "publish with no per-order resource record; dropping event");
            return;
        }

        let queue = OrderQueue::new(
            self.redis.clone(),
            order_id,
            status_queue_name(event.status),
        );

        let job_key = format!("{order_id}:{:?}:{}", event.status, event.timestamp.timestamp_nanos_opt().unwrap_or(0));
        let job = QueueJob::new(job_key, event, MAX_ATTEMPTS);

        match queue.enqueue(job, DEDUPE_WINDOW).await {
            Ok(_) => self.resources.touch(order_id),
            Err(e) => {
                tracing::error!(%order_id, error = %e, "event publish failed; dropping (row remains canonical)");
            }
        }
    }
}
