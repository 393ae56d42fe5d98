use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::capability::chain::Chain;
use crate::capability::router::{Quote, Router};
use crate::capability::store::{OrderStore, StatusTransition};
use crate::error::AppError;
use crate::models::event::StatusEvent;
use crate::models::order::{Order, OrderStatus};
use crate::redis::RedisPool;

use super::event_publisher::EventPublisher;

const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Orchestrates B (`Router`/`Chain`) and A (`OrderStore`) through the
/// forward-only state machine of §4.1, publishing via D after every durable
/// write. One `OrderLifecycle::run` call drives one order from its current
/// state through to a terminal one.
#[derive(Clone)]
pub struct OrderLifecycle {
    store: Arc<dyn OrderStore>,
    router: Arc<dyn Router>,
    chain: Arc<dyn Chain>,
    publisher: EventPublisher,
    redis: RedisPool,
}

impl OrderLifecycle {
    pub fn new(
        store: Arc<dyn OrderStore>,
        router: Arc<dyn Router>,
        chain: Arc<dyn Chain>,
        publisher: EventPublisher,
        redis: RedisPool,
    ) -> Self {
        Self {
            store,
            router,
            chain,
            publisher,
            redis,
        }
    }

    pub fn redis(&self) -> RedisPool {
        self.redis.clone()
    }

    async fn publish(&self, order: &Order) {
        let event = StatusEvent {
            order_id: order.order_id,
            status: order.status,
            dex_type: order.dex_type,
            executed_price: order.executed_price,
            tx_hash: order.tx_hash.clone(),
            error_reason: order.error_reason.clone(),
            timestamp: order.updated_at,
        };
        self.publisher.publish(event).await;
    }

    /// Persist `FAILED` with `error_reason`, retrying the store write once
    /// directly (bypassing event publication) if the first attempt fails.
    async fn fail(&self, order_id: Uuid, reason: String) -> Result<(), AppError> {
        tracing::warn!(%order_id, reason = %reason, "order transitioning to failed");

        let transition = StatusTransition::Failed {
            error_reason: reason.clone(),
        };

        let order = match self.store.update_status(order_id, transition.clone()).await {
            Ok(order) => order,
            Err(first_err) => {
                tracing::warn!(%order_id, error = %first_err, "failed-state write failed; retrying once");
                self.store.update_status(order_id, transition).await?
            }
        };

        self.publish(&order).await;
        Ok(())
    }

    /// Drive `order_id` from its current persisted state through to a
    /// terminal state. Idempotent: an order already in a terminal state is a
    /// no-op, and each stage only runs from its expected predecessor state.
    pub async fn run(&self, order_id: Uuid) -> Result<(), AppError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if order.status.is_terminal() {
            return Ok(());
        }

        let (order, quote) = match self.route(order).await {
            Ok(pair) => pair,
            Err(e) => return self.fail(order_id, e).await,
        };

        let (order, built) = match self.build(order, &quote).await {
            Ok(pair) => pair,
            Err(e) => return self.fail(order_id, e).await,
        };

        let order = match self.submit(order, &built).await {
            Ok(order) => order,
            Err(e) => return self.fail(order_id, e).await,
        };

        match self.confirm(order, &quote).await {
            Ok(_) => Ok(()),
            Err(e) => self.fail(order_id, e).await,
        }
    }

    async fn route(&self, order: Order) -> Result<(Order, Quote), String> {
        // The order row has no persisted quote columns, so a resume past
        // PENDING still has to ask the router for a fresh one before the
        // later stages can run; the predecessor-state check only gates the
        // transition write, never the read-only quote lookup.
        let is_predecessor = order.status == OrderStatus::Pending;

        let quote = self
            .router
            .best_quote(&order)
            .await
            .map_err(|e| format!("DEX routing failed: {e}"))?;

        if !is_predecessor {
            return Ok((order, quote));
        }

        let updated = self
            .store
            .update_status(order.order_id, StatusTransition::Routing)
            .await
            .map_err(|e| format!("DEX routing failed: store write error: {e}"))?;

        self.publish(&updated).await;
        Ok((updated, quote))
    }

    async fn build(
        &self,
        order: Order,
        quote: &Quote,
    ) -> Result<(Order, crate::capability::router::BuiltTx), String> {
        if order.status == OrderStatus::Submitted {
            // submit() below checks this same status first and will no-op
            // without ever touching `built`, so there is nothing for
            // build_tx to produce here.
            let dex = order.dex_type.unwrap_or(quote.dex);
            return Ok((order, crate::capability::router::BuiltTx { dex, blob: Vec::new() }));
        }

        let built = self
            .router
            .build_tx(&order, quote)
            .await
            .map_err(|e| format!("Transaction building failed: {e}"))?;

        if order.status == OrderStatus::Building {
            return Ok((order, built));
        }

        let updated = self
            .store
            .update_status(
                order.order_id,
                StatusTransition::Building {
                    dex_type: built.dex,
                },
            )
            .await
            .map_err(|e| format!("Transaction building failed: store write error: {e}"))?;

        self.publish(&updated).await;
        Ok((updated, built))
    }

    async fn submit(
        &self,
        order: Order,
        built: &crate::capability::router::BuiltTx,
    ) -> Result<Order, String> {
        if order.status == OrderStatus::Submitted {
            return Ok(order);
        }

        let tx_hash = self
            .chain
            .submit(built)
            .await
            .map_err(|e| format!("Transaction submission failed: {e}"))?;

        let updated = self
            .store
            .update_status(
                order.order_id,
                StatusTransition::Submitted {
                    tx_hash: tx_hash.clone(),
                },
            )
            .await
            .map_err(|e| format!("Transaction submission failed: store write error: {e}"))?;

        self.publish(&updated).await;
        Ok(updated)
    }

    async fn confirm(&self, order: Order, quote: &Quote) -> Result<Order, String> {
        let tx_hash = order
            .tx_hash
            .clone()
            .ok_or_else(|| "Transaction confirmation attempted with no tx_hash".to_string())?;

        self.chain
            .await_confirmation(&tx_hash, CONFIRMATION_TIMEOUT)
            .await
            .map_err(|e| e.to_string())?;

        let executed_price = compute_executed_price(quote, order.slippage_tolerance);

        let updated = self
            .store
            .update_status(
                order.order_id,
                StatusTransition::Confirmed { executed_price },
            )
            .await
            .map_err(|e| format!("store write error while confirming: {e}"))?;

        self.publish(&updated).await;
        Ok(updated)
    }
}

/// §4.1 slippage rule. `E` = effective price, `Q` = quote price, `S` =
/// slippage tolerance percent. `σ = |Q - E| / E * 100`.
///
/// - `σ > S`: `executedPrice = E * (1 - S/100)`.
/// - otherwise: `executedPrice = E * (1 - U)`, `U ~ Uniform(0, 0.001)`.
///
/// Reported with 8 fractional digits.
pub fn compute_executed_price(quote: &Quote, slippage_tolerance: Decimal) -> Decimal {
    let e = quote.effective_price;
    let q = quote.quote_price;

    let sigma = if e.is_zero() {
        Decimal::ZERO
    } else {
        ((q - e).abs() / e) * Decimal::ONE_HUNDRED
    };

    let raw = if sigma > slippage_tolerance {
        e * (Decimal::ONE - slippage_tolerance / Decimal::ONE_HUNDRED)
    } else {
        let u = Decimal::new(rand::random::<i64>().rem_euclid(1000), 6); // [0, 0.001)
        e * (Decimal::ONE - u)
    };

    raw.round_dp(8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::order::DexType;
    use rust_decimal_macros::dec;

    fn quote(quote_price: Decimal, effective_price: Decimal) -> Quote {
        Quote {
            dex: DexType::Raydium,
            quote_price,
            effective_price,
        }
    }

    #[test]
    fn zero_slippage_tolerance_with_nonzero_sigma_uses_tolerance_branch() {
        let q = quote(dec!(1.01), dec!(1.00));
        let price = compute_executed_price(&q, Decimal::ZERO);
        // sigma = 1.0 > 0 => executedPrice = E * (1 - 0/100) = E
        assert_eq!(price, dec!(1.00000000));
    }

    #[test]
    fn zero_sigma_falls_through_to_microvariance_branch() {
        let q = quote(dec!(1.00), dec!(1.00));
        let price = compute_executed_price(&q, dec!(0.5));
        // sigma = 0, not > 0.5, so microvariance branch: E*(1-U), U in [0, 0.001)
        assert!(price <= dec!(1.00000000));
        assert!(price > dec!(0.99800000));
    }

    #[test]
    fn exceeding_tolerance_clamps_to_tolerance() {
        let q = quote(dec!(1.10), dec!(1.00));
        let price = compute_executed_price(&q, dec!(5));
        // sigma = 10 > 5 => E * (1 - 0.05) = 0.95
        assert_eq!(price, dec!(0.95000000));
    }
}
