use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use crate::capability::store::CreateOrderParams;
use crate::error::{error_body, AppError, AppResult};
use crate::models::order::Order;
use crate::services::{delivery_workers, execution_queue};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders/execute", post(create_order))
        .route("/api/orders", get(list_orders))
        .route("/api/orders/:order_id", get(get_order))
}

#[derive(Debug, Deserialize)]
struct CreateOrderRequest {
    token_in: String,
    token_out: String,
    amount_in: Decimal,
    slippage_tolerance: Decimal,
    min_amount_out: Option<Decimal>,
}

fn validate_create_request(req: &CreateOrderRequest) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if req.token_in.trim().is_empty() {
        errors.push("tokenIn must be a non-empty string".to_string());
    }
    if req.token_out.trim().is_empty() {
        errors.push("tokenOut must be a non-empty string".to_string());
    }
    if req.amount_in <= Decimal::ZERO {
        errors.push("amountIn must be positive".to_string());
    }
    if req.slippage_tolerance < Decimal::ZERO || req.slippage_tolerance > Decimal::ONE_HUNDRED {
        errors.push("slippageTolerance must be between 0 and 100".to_string());
    }
    if let Some(min_out) = req.min_amount_out {
        if min_out < Decimal::ZERO {
            errors.push("minAmountOut must be non-negative".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> impl axum::response::IntoResponse {
    if let Err(details) = validate_create_request(&req) {
        let mut body = error_body("Validation error", details.join("; "));
        body["details"] = json!(details);
        return (StatusCode::BAD_REQUEST, Json(body));
    }

    let order = match state
        .store
        .create_order(CreateOrderParams {
            token_in: req.token_in,
            token_out: req.token_out,
            amount_in: req.amount_in,
            slippage_tolerance: req.slippage_tolerance,
            min_amount_out: req.min_amount_out,
        })
        .await
    {
        Ok(order) => order,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_body("Internal error", e.to_string())),
            );
        }
    };

    let order_id = order.order_id;

    let delivery_handles = delivery_workers::spawn_delivery_workers(
        state.redis.clone(),
        state.push_registry.clone(),
        order_id,
        state.config.ws_worker_concurrency as usize,
        state.config.ws_worker_rate_limit_per_minute,
    );
    let execution_handle = execution_queue::spawn_execution_worker(
        state.redis.clone(),
        state.lifecycle.clone(),
        order_id,
        state.config.queue_max_concurrency as usize,
    );
    state
        .resource_manager
        .allocate(order_id, execution_handle, delivery_handles);

    if let Err(e) = execution_queue::enqueue(state.redis.clone(), order_id).await {
        tracing::error!(%order_id, error = %e, "failed to enqueue execution job");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(error_body(
                "Internal error",
                "failed to enqueue order for execution",
            )),
        );
    }

    // Give the just-committed row a moment to become visible; under normal
    // load this never actually retries.
    for delay_ms in [200, 500, 1000] {
        if let Ok(Some(fresh)) = state.store.get_order(order_id).await {
            let body = json!({
                "success": true,
                "orderId": order_id,
                "status": "pending",
                "order": fresh,
            });
            return (StatusCode::CREATED, Json(body));
        }
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    let body = json!({
        "success": true,
        "orderId": order_id,
        "status": "pending",
        "message": "order accepted; re-fetch to observe the persisted row",
    });
    (StatusCode::CREATED, Json(body))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Serialize)]
struct ListResponse {
    success: bool,
    orders: Vec<Order>,
    count: i64,
}

async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ListResponse>> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let offset = query.offset.unwrap_or(0).max(0);

    let (orders, count) = state.store.list_orders(limit, offset).await?;

    Ok(Json(ListResponse {
        success: true,
        orders,
        count,
    }))
}

async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let order = state
        .store
        .get_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    Ok(Json(json!({
        "success": true,
        "order": order,
    })))
}
