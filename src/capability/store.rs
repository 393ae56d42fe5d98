use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::{DexType, Order, OrderStatus};

#[derive(Debug, Clone)]
pub struct CreateOrderParams {
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    pub slippage_tolerance: Decimal,
    pub min_amount_out: Option<Decimal>,
}

/// The durable fields written by each lifecycle transition (§4.1).
#[derive(Debug, Clone)]
pub enum StatusTransition {
    Routing,
    Building { dex_type: DexType },
    Submitted { tx_hash: String },
    Confirmed { executed_price: Decimal },
    Failed { error_reason: String },
}

impl StatusTransition {
    pub fn target(&self) -> OrderStatus {
        match self {
            Self::Routing => OrderStatus::Routing,
            Self::Building { .. } => OrderStatus::Building,
            Self::Submitted { .. } => OrderStatus::Submitted,
            Self::Confirmed { .. } => OrderStatus::Confirmed,
            Self::Failed { .. } => OrderStatus::Failed,
        }
    }
}

/// Durable CRUD on orders. The lifecycle is the only writer; `SubmissionAPI`
/// only creates and reads.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_order(&self, params: CreateOrderParams) -> Result<Order, AppError>;
    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError>;
    async fn list_orders(&self, limit: i64, offset: i64) -> Result<(Vec<Order>, i64), AppError>;
    async fn update_status(
        &self,
        order_id: Uuid,
        transition: StatusTransition,
    ) -> Result<Order, AppError>;
}

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create_order(&self, params: CreateOrderParams) -> Result<Order, AppError> {
        let order_id = Uuid::new_v4();

        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                order_id, token_in, token_out, amount_in, slippage_tolerance,
                min_amount_out, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', now(), now())
            RETURNING *
            "#,
        )
        .bind(order_id)
        .bind(&params.token_in)
        .bind(&params.token_out)
        .bind(params.amount_in)
        .bind(params.slippage_tolerance)
        .bind(params.min_amount_out)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(order_id = %order.order_id, "order created");
        metrics::counter!("orders_created_total").increment(1);

        let _ = crate::audit::log(
            &self.pool,
            "order.created",
            "order",
            Some(&order.order_id.to_string()),
            serde_json::json!({"tokenIn": order.token_in, "tokenOut": order.token_out}),
            "system",
        )
        .await;

        Ok(order)
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    async fn list_orders(&self, limit: i64, offset: i64) -> Result<(Vec<Order>, i64), AppError> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok((orders, count))
    }

    async fn update_status(
        &self,
        order_id: Uuid,
        transition: StatusTransition,
    ) -> Result<Order, AppError> {
        let current = self
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        let target = transition.target();
        if !current.status.can_transition_to(&target) {
            return Err(AppError::Conflict(format!(
                "cannot transition order {order_id} from {:?} to {:?}",
                current.status, target
            )));
        }

        let order = match transition {
            StatusTransition::Routing => {
                sqlx::query_as::<_, Order>(
                    "UPDATE orders SET status = 'routing', updated_at = now()
                     WHERE order_id = $1 RETURNING *",
                )
                .bind(order_id)
                .fetch_one(&self.pool)
                .await?
            }
            StatusTransition::Building { dex_type } => {
                sqlx::query_as::<_, Order>(
                    "UPDATE orders SET status = 'building', dex_type = $2, updated_at = now()
                     WHERE order_id = $1 RETURNING *",
                )
                .bind(order_id)
                .bind(dex_type)
                .fetch_one(&self.pool)
                .await?
            }
            StatusTransition::Submitted { tx_hash } => {
                sqlx::query_as::<_, Order>(
                    "UPDATE orders SET status = 'submitted', tx_hash = $2, updated_at = now()
                     WHERE order_id = $1 RETURNING *",
                )
                .bind(order_id)
                .bind(tx_hash)
                .fetch_one(&self.pool)
                .await?
            }
            StatusTransition::Confirmed { executed_price } => {
                sqlx::query_as::<_, Order>(
                    "UPDATE orders SET status = 'confirmed', executed_price = $2, updated_at = now()
                     WHERE order_id = $1 RETURNING *",
                )
                .bind(order_id)
                .bind(executed_price)
                .fetch_one(&self.pool)
                .await?
            }
            StatusTransition::Failed { error_reason } => {
                sqlx::query_as::<_, Order>(
                    "UPDATE orders SET status = 'failed', error_reason = $2, updated_at = now()
                     WHERE order_id = $1 RETURNING *",
                )
                .bind(order_id)
                .bind(error_reason)
                .fetch_one(&self.pool)
                .await?
            }
        };

        tracing::info!(order_id = %order.order_id, status = order.status.as_str(), "order status updated");
        metrics::counter!("order_transitions_total", "to" => order.status.as_str()).increment(1);

        let _ = crate::audit::log(
            &self.pool,
            "order.status_changed",
            "order",
            Some(&order.order_id.to_string()),
            serde_json::json!({"from": current.status.as_str(), "to": order.status.as_str()}),
            "system",
        )
        .await;

        Ok(order)
    }
}
