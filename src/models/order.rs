use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Routing,
    Building,
    Submitted,
    Confirmed,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// Forward-only transitions. Every non-terminal state may additionally
    /// fail into `Failed`; no state skips or reverses.
    pub fn valid_transitions(&self) -> &'static [OrderStatus] {
        match self {
            Self::Pending => &[Self::Routing, Self::Failed],
            Self::Routing => &[Self::Building, Self::Failed],
            Self::Building => &[Self::Submitted, Self::Failed],
            Self::Submitted => &[Self::Confirmed, Self::Failed],
            Self::Confirmed => &[],
            Self::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, next: &OrderStatus) -> bool {
        self.valid_transitions().contains(next)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Routing => "routing",
            Self::Building => "building",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "dex_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DexType {
    Raydium,
    Meteora,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub order_id: Uuid,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    pub slippage_tolerance: Decimal,
    pub min_amount_out: Option<Decimal>,
    pub status: OrderStatus,
    pub dex_type: Option<DexType>,
    pub executed_price: Option<Decimal>,
    pub tx_hash: Option<String>,
    pub error_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Invariant: `errorReason != None <=> status = failed`.
    pub fn error_reason_invariant_holds(&self) -> bool {
        (self.error_reason.is_some()) == (self.status == OrderStatus::Failed)
    }
}
