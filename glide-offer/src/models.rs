use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A priced, time-bounded promise to rent one scooter.
///
/// Offers live in the key-value store for their whole lifetime; the TTL on
/// the stored keys is the only garbage collection they get.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub user_id: String,
    pub scooter_id: String,
    pub zone_id: String,
    pub price_per_minute: i64,
    pub price_unlock: i64,
    pub deposit: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Offer {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
