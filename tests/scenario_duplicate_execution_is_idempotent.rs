mod common;

use order_execution_engine::queue::{OrderQueue, QueueJob};
use order_execution_engine::services::execution_queue;
use uuid::Uuid;

/// §4.6: a second execution enqueue for an order already queued is a no-op,
/// since the job key is the order id itself.
#[tokio::test]
async fn duplicate_enqueue_for_same_order_is_suppressed() {
    let Some(redis) = common::try_redis().await else {
        return;
    };

    let order_id = Uuid::new_v4();

    let first = execution_queue::enqueue(redis.clone(), order_id)
        .await
        .expect("first enqueue");
    let second = execution_queue::enqueue(redis.clone(), order_id)
        .await
        .expect("second enqueue");

    assert!(first, "first enqueue for a fresh order id must succeed");
    assert!(!second, "duplicate enqueue for the same order id must be suppressed");

    order_execution_engine::queue::teardown(&redis, order_id)
        .await
        .expect("teardown");
}

/// The same dedupe guard applies to any named queue, not just the execution
/// queue: two jobs with the same job key never both land in the list.
#[tokio::test]
async fn duplicate_job_key_on_a_status_queue_is_suppressed() {
    let Some(redis) = common::try_redis().await else {
        return;
    };

    let order_id = Uuid::new_v4();
    let queue = OrderQueue::new(redis.clone(), order_id, "status/confirmed");

    let job_a = QueueJob::new("dup-key", "payload-a".to_string(), 3);
    let job_b = QueueJob::new("dup-key", "payload-b".to_string(), 3);

    let first = queue
        .enqueue(job_a, std::time::Duration::from_secs(60))
        .await
        .expect("first enqueue");
    let second = queue
        .enqueue(job_b, std::time::Duration::from_secs(60))
        .await
        .expect("second enqueue");

    assert!(first);
    assert!(!second);

    order_execution_engine::queue::teardown(&redis, order_id)
        .await
        .expect("teardown");
}
