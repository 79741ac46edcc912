use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Active,
    Finished,
    /// Reserved; no operation produces it yet.
    Cancelled,
    PaymentFailed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Active => "ACTIVE",
            OrderStatus::Finished => "FINISHED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::PaymentFailed => "PAYMENT_FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Active)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(OrderStatus::Active),
            "FINISHED" => Ok(OrderStatus::Finished),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "PAYMENT_FAILED" => Ok(OrderStatus::PaymentFailed),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// The durable record of one ride. The `id` is the client-supplied
/// idempotency key; the pricing fields are a snapshot taken from the offer
/// at create time and never mutate afterwards.
///
/// `total_amount` accumulates from `price_unlock` at create to the final
/// billed amount at finish; it travels as `current_amount` in JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub offer_id: String,
    pub user_id: String,
    pub scooter_id: String,
    pub status: OrderStatus,
    pub start_time: DateTime<Utc>,
    pub finish_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub price_per_minute: i64,
    pub price_unlock: i64,
    pub deposit: i64,
    #[serde(rename = "current_amount")]
    pub total_amount: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Hold,
    Clear,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Hold => "HOLD",
            TransactionType::Clear => "CLEAR",
            TransactionType::Refund => "REFUND",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    Failed,
    Pending,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Pending => "PENDING",
        }
    }

    /// SUCCESS/FAILED from a payments-call outcome. The bit reflects the
    /// call, not whether money actually moved (a zero-amount clear is a
    /// SUCCESS).
    pub fn from_outcome(ok: bool) -> Self {
        if ok {
            TransactionStatus::Success
        } else {
            TransactionStatus::Failed
        }
    }
}

/// Append-only ledger row tied to an order by FK (cascade on delete).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub status: TransactionStatus,
    pub external_transaction_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}
