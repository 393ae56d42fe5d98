use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::order::{DexType, Order};

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("{0}")]
    QuoteFailed(String),
    #[error("{0}")]
    BuildFailed(String),
}

/// A price + fee record returned by a router for a given order.
#[derive(Debug, Clone)]
pub struct Quote {
    pub dex: DexType,
    /// The raw quoted price.
    pub quote_price: Decimal,
    /// Quote price less fee; compared across routers.
    pub effective_price: Decimal,
}

/// An opaque transaction blob produced by `Router::build_tx`.
#[derive(Debug, Clone)]
pub struct BuiltTx {
    pub dex: DexType,
    pub blob: Vec<u8>,
}

/// Quoting and transaction-building capability. The core never names a
/// concrete DEX adapter; it only depends on this trait.
#[async_trait]
pub trait Router: Send + Sync {
    async fn best_quote(&self, order: &Order) -> Result<Quote, RouterError>;
    async fn build_tx(&self, order: &Order, quote: &Quote) -> Result<BuiltTx, RouterError>;
}

/// A runnable stand-in for a real DEX aggregator. Alternates between the two
/// venues named in the wire protocol (`raydium`, `meteora`) and derives a
/// quote from the order's own amount so the pipeline has something
/// deterministic to chew on without a network dependency.
pub struct SimulatedRouter {
    /// When set, `best_quote` always fails with this message. Used by tests
    /// exercising the routing-failure scenario.
    pub force_quote_failure: Option<String>,
}

impl SimulatedRouter {
    pub fn new() -> Self {
        Self {
            force_quote_failure: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            force_quote_failure: Some(message.into()),
        }
    }
}

impl Default for SimulatedRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Router for SimulatedRouter {
    async fn best_quote(&self, order: &Order) -> Result<Quote, RouterError> {
        if let Some(msg) = &self.force_quote_failure {
            return Err(RouterError::QuoteFailed(msg.clone()));
        }

        let dex = if rand::random::<bool>() {
            DexType::Raydium
        } else {
            DexType::Meteora
        };

        // A market price around 1.0 for the pair, nudged by a small random
        // spread so `quote_price` and `effective_price` rarely coincide.
        let spread = Decimal::new(rand::random::<i64>().rem_euclid(50), 4); // 0.0000–0.0049
        let quote_price = Decimal::ONE + spread;
        let fee = dec!(0.003) * quote_price;
        let effective_price = quote_price - fee;

        tracing::debug!(order_id = %order.order_id, dex = ?dex, %quote_price, %effective_price, "quoted order");

        Ok(Quote {
            dex,
            quote_price,
            effective_price,
        })
    }

    async fn build_tx(&self, order: &Order, quote: &Quote) -> Result<BuiltTx, RouterError> {
        let blob = format!(
            "{}:{}:{}:{}",
            order.order_id, order.token_in, order.token_out, quote.effective_price
        )
        .into_bytes();

        Ok(BuiltTx {
            dex: quote.dex,
            blob,
        })
    }
}
