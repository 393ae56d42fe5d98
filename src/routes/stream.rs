use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::event::{ClientFrame, StatusEvent, WireFrame};
use crate::AppState;

const SNAPSHOT_DELAY: Duration = Duration::from_millis(300);
const CHANNEL_CAPACITY: usize = 64;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/orders/:order_id/stream", get(stream_order))
}

async fn stream_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_stream(socket, state, order_id))
}

/// One push-channel connection for a single order (§4.7 `subscribe`).
/// Registers with the push registry, replies `connected`, schedules a
/// ~300ms-deferred snapshot of the current persisted row, and forwards every
/// subsequent status frame fanned out by the delivery workers.
async fn handle_stream(socket: WebSocket, state: AppState, order_id: Uuid) {
    metrics::counter!("stream_connections_total").increment(1);
    tracing::info!(%order_id, "push channel connected");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

    let subscriber_id = state.push_registry.register(order_id, tx.clone());

    if let Ok(connected) = WireFrame::connected(order_id).to_json() {
        if sender.send(Message::Text(connected)).await.is_err() {
            state.push_registry.unregister(subscriber_id);
            return;
        }
    }

    let snapshot_state = state.clone();
    let snapshot_tx = tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(SNAPSHOT_DELAY).await;
        if let Ok(Some(order)) = snapshot_state.store.get_order(order_id).await {
            let event = StatusEvent {
                order_id: order.order_id,
                status: order.status,
                dex_type: order.dex_type,
                executed_price: order.executed_price,
                tx_hash: order.tx_hash,
                error_reason: order.error_reason,
                timestamp: order.updated_at,
            };
            if let Ok(body) = WireFrame::StatusUpdate(event).to_json() {
                let _ = snapshot_tx.send(body).await;
            }
        }
    });

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                match outgoing {
                    Some(body) => {
                        if sender.send(Message::Text(body)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(ClientFrame::Ping) = serde_json::from_str(&text) {
                            if let Ok(pong) = WireFrame::pong().to_json() {
                                if sender.send(Message::Text(pong)).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    state.push_registry.unregister(subscriber_id);
    metrics::counter!("stream_disconnections_total").increment(1);
    tracing::info!(%order_id, "push channel disconnected");
}
