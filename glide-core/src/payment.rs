use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::BoxError;

/// Result of a hold attempt against the payments service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldOutcome {
    pub transaction_id: String,
    pub ok: bool,
}

/// Typed client for the payments service.
///
/// The gateway never retries internally; callers compose their own policy.
#[async_trait]
pub trait PaymentsApi: Send + Sync {
    /// Reserve `amount` on the user's instrument for the given order.
    async fn hold(
        &self,
        user_id: &str,
        order_id: &str,
        amount: i64,
    ) -> Result<HoldOutcome, BoxError>;

    /// Capture `amount` for the given order.
    async fn charge(&self, order_id: &str, amount: i64) -> Result<(), BoxError>;

    /// Release a previous hold for the given order.
    async fn unhold(&self, order_id: &str) -> Result<(), BoxError>;
}
