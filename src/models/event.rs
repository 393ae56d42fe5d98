use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::{DexType, OrderStatus};

/// The wire record flowing through status queues and out to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub order_id: Uuid,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dex_type: Option<DexType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    /// Priority is carried for parity with the source design but is never
    /// used to reorder dequeues — queues are already split per status.
    pub fn priority(&self) -> u8 {
        match self.status {
            OrderStatus::Failed => 10,
            OrderStatus::Confirmed => 9,
            OrderStatus::Submitted => 8,
            OrderStatus::Building => 7,
            OrderStatus::Routing => 6,
            OrderStatus::Pending => 5,
        }
    }
}

/// Frames sent down a push channel. Tagged by `type` for `Connected`/`Pong`;
/// a bare `StatusUpdate` frame carries no `type` tag, matching §6's wire
/// shape (`{orderId, status, ...}` with no envelope).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireFrame {
    Connected {
        #[serde(rename = "type")]
        frame_type: ConnectedTag,
        order_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    Pong {
        #[serde(rename = "type")]
        frame_type: PongTag,
        timestamp: DateTime<Utc>,
    },
    StatusUpdate(StatusEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConnectedTag {
    #[serde(rename = "connected")]
    Connected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PongTag {
    #[serde(rename = "pong")]
    Pong,
}

impl WireFrame {
    pub fn connected(order_id: Uuid) -> Self {
        Self::Connected {
            frame_type: ConnectedTag::Connected,
            order_id,
            timestamp: Utc::now(),
        }
    }

    pub fn pong() -> Self {
        Self::Pong {
            frame_type: PongTag::Pong,
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Inbound frames a client may send on the push channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_matches_spec_table() {
        let mk = |status: OrderStatus| StatusEvent {
            order_id: Uuid::nil(),
            status,
            dex_type: None,
            executed_price: None,
            tx_hash: None,
            error_reason: None,
            timestamp: Utc::now(),
        };
        assert_eq!(mk(OrderStatus::Failed).priority(), 10);
        assert_eq!(mk(OrderStatus::Confirmed).priority(), 9);
        assert_eq!(mk(OrderStatus::Submitted).priority(), 8);
        assert_eq!(mk(OrderStatus::Building).priority(), 7);
        assert_eq!(mk(OrderStatus::Routing).priority(), 6);
        assert_eq!(mk(OrderStatus::Pending).priority(), 5);
    }

    #[test]
    fn connected_frame_serializes_with_type_tag() {
        let frame = WireFrame::connected(Uuid::nil());
        let json = frame.to_json().unwrap();
        assert!(json.contains("\"type\":\"connected\""));
    }

    #[test]
    fn status_update_frame_has_no_type_tag() {
        let event = StatusEvent {
            order_id: Uuid::nil(),
            status: OrderStatus::Pending,
            dex_type: None,
            executed_price: None,
            tx_hash: None,
            error_reason: None,
            timestamp: Utc::now(),
        };
        let frame = WireFrame::StatusUpdate(event);
        let json = frame.to_json().unwrap();
        assert!(!json.contains("\"type\""));
        assert!(json.contains("\"status\":\"pending\""));
    }
}
