mod common;

use std::sync::Arc;

use order_execution_engine::capability::chain::{Chain, SimulatedChain};
use order_execution_engine::capability::router::{Router, SimulatedRouter};
use order_execution_engine::capability::store::CreateOrderParams;
use order_execution_engine::models::order::OrderStatus;
use order_execution_engine::services::order_lifecycle::OrderLifecycle;
use rust_decimal_macros::dec;

/// §8.1: a clean order runs pending -> routing -> building -> submitted ->
/// confirmed, with an 8-decimal executed price and a dex/tx hash recorded.
#[tokio::test]
async fn full_confirmation_reaches_confirmed_with_eight_decimal_price() {
    let Some(infra) = common::try_setup().await else {
        return;
    };

    let router: Arc<dyn Router> = Arc::new(SimulatedRouter::new());
    let chain: Arc<dyn Chain> = Arc::new(SimulatedChain::new());

    let lifecycle = OrderLifecycle::new(
        infra.store.clone(),
        router,
        chain,
        infra.publisher.clone(),
        infra.redis.clone(),
    );

    let order = infra
        .store
        .create_order(CreateOrderParams {
            token_in: "SOL".into(),
            token_out: "USDC".into(),
            amount_in: dec!(10),
            slippage_tolerance: dec!(5),
            min_amount_out: None,
        })
        .await
        .expect("create_order");
    assert_eq!(order.status, OrderStatus::Pending);

    lifecycle.run(order.order_id).await.expect("lifecycle run");

    let final_order = infra
        .store
        .get_order(order.order_id)
        .await
        .expect("get_order")
        .expect("order exists");

    assert_eq!(final_order.status, OrderStatus::Confirmed);
    assert!(final_order.dex_type.is_some());
    assert!(final_order.tx_hash.is_some());
    assert!(final_order.error_reason.is_none());

    let price = final_order.executed_price.expect("executed price set");
    assert_eq!(price.round_dp(8), price, "executed price must be reported with 8 fractional digits");
    assert!(price > dec!(0));
}

/// Re-running `run` against an already-confirmed order is a no-op: the
/// terminal-state early return in `OrderLifecycle::run` must hold.
#[tokio::test]
async fn rerunning_a_confirmed_order_does_not_change_it() {
    let Some(infra) = common::try_setup().await else {
        return;
    };

    let router: Arc<dyn Router> = Arc::new(SimulatedRouter::new());
    let chain: Arc<dyn Chain> = Arc::new(SimulatedChain::new());

    let lifecycle = OrderLifecycle::new(
        infra.store.clone(),
        router,
        chain,
        infra.publisher.clone(),
        infra.redis.clone(),
    );

    let order = infra
        .store
        .create_order(CreateOrderParams {
            token_in: "SOL".into(),
            token_out: "USDC".into(),
            amount_in: dec!(1),
            slippage_tolerance: dec!(5),
            min_amount_out: None,
        })
        .await
        .expect("create_order");

    lifecycle.run(order.order_id).await.expect("first run");
    let confirmed = infra
        .store
        .get_order(order.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);

    lifecycle.run(order.order_id).await.expect("second run is a no-op");
    let unchanged = infra
        .store
        .get_order(order.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.executed_price, confirmed.executed_price);
    assert_eq!(unchanged.tx_hash, confirmed.tx_hash);
    assert_eq!(unchanged.updated_at, confirmed.updated_at);
}
