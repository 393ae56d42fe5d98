mod common;

use std::time::Duration;

use uuid::Uuid;

/// §4.4: once an order's idle timer elapses with no activity, its resource
/// bundle is reaped — `has_resources` goes false and further touches are
/// no-ops, without the persisted row being touched.
#[tokio::test]
async fn resources_are_reaped_after_idle_timeout() {
    let Some(infra) = common::try_setup().await else {
        return;
    };
    // `try_setup` arms a 200ms idle timeout for exactly this test.

    let order_id = Uuid::new_v4();
    let execution_worker = tokio::spawn(async {
        std::future::pending::<()>().await;
    });

    infra
        .resource_manager
        .allocate(order_id, execution_worker, Vec::new());
    assert!(infra.resource_manager.has_resources(order_id));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(
        !infra.resource_manager.has_resources(order_id),
        "resource bundle should have been reaped once the idle timer elapsed"
    );

    // A touch on an already-reaped order is a documented no-op, not a panic.
    infra.resource_manager.touch(order_id);
}
