use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use glide_core::BoxError;

use crate::models::{Order, OrderStatus};

/// Everything `finish_order` writes in its single transaction: the status
/// transition plus the CLEAR and REFUND ledger rows.
#[derive(Debug, Clone)]
pub struct FinishParams {
    pub finish_time: DateTime<Utc>,
    pub duration_seconds: i64,
    pub total_amount: i64,
    pub final_status: OrderStatus,
    pub charge_success: bool,
    pub unhold_success: bool,
    pub charge_tx_id: Option<String>,
}

/// Durable order storage.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts the order and its HOLD payment transaction in one database
    /// transaction. `hold_tx_id` is the external transaction id returned by
    /// the payments service.
    async fn create_order(&self, order: &Order, hold_tx_id: &str) -> Result<(), BoxError>;

    async fn get_order_by_id(&self, order_id: &str) -> Result<Option<Order>, BoxError>;

    /// Most recent order for the offer, or `None`.
    async fn get_order_by_offer_id(&self, offer_id: &str) -> Result<Option<Order>, BoxError>;

    /// Applies the terminal transition and appends the CLEAR and REFUND
    /// transactions in one database transaction. The update only matches
    /// rows still ACTIVE; a lost race surfaces as an error.
    async fn finish_order(&self, order_id: &str, params: FinishParams) -> Result<(), BoxError>;

    /// Terminal orders created more than `older_than` ago.
    async fn get_old_orders(&self, older_than: Duration) -> Result<Vec<Order>, BoxError>;

    /// Bulk delete; the FK cascade removes dependent payment transactions.
    async fn delete_orders(&self, order_ids: &[String]) -> Result<(), BoxError>;
}

/// Best-effort read-through cache for hot order reads. Values are
/// non-authoritative and reconstructable from the repository.
#[async_trait]
pub trait OrderCache: Send + Sync {
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, BoxError>;

    async fn set_order(&self, order: &Order, ttl: std::time::Duration) -> Result<(), BoxError>;

    async fn invalidate(&self, order_id: &str) -> Result<(), BoxError>;
}
