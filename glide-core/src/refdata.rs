use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::BoxError;

/// Scooter state as reported by the reference data service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScooterData {
    pub id: String,
    pub zone_id: String,
    pub charge: i32,
}

/// Tariff parameters for a zone, in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffZone {
    pub id: String,
    pub price_per_minute: i64,
    pub price_unlock: i64,
    pub default_deposit: i64,
}

/// User billing flags. The wire field `has_subscribtion` is misspelled
/// upstream; the misspelling is part of the contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(rename = "has_subscribtion")]
    pub has_subscription: bool,
    pub trusted: bool,
}

/// Dynamic pricing/billing parameters polled from the reference data
/// service. `Default` is the process cold-start value set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningKnobs {
    pub surge: f64,
    pub low_charge_discount: f64,
    pub low_charge_threshold_percent: i32,
    pub incomplete_ride_threshold_seconds: i64,
}

impl Default for TuningKnobs {
    fn default() -> Self {
        Self {
            surge: 1.2,
            low_charge_discount: 0.7,
            low_charge_threshold_percent: 28,
            incomplete_ride_threshold_seconds: 5,
        }
    }
}

/// Typed client for the upstream reference data service.
///
/// Every getter maps a 404 to `Ok(None)`; transport failures and
/// unexpected statuses surface as errors.
#[async_trait]
pub trait ReferenceDataApi: Send + Sync {
    async fn get_scooter(&self, scooter_id: &str) -> Result<Option<ScooterData>, BoxError>;

    async fn get_zone(&self, zone_id: &str) -> Result<Option<TariffZone>, BoxError>;

    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, BoxError>;

    /// Fetch the tuning knobs. Keys missing from the payload fall back to
    /// the wire-level defaults, not the process cold-start defaults.
    async fn get_tuning(&self) -> Result<TuningKnobs, BoxError>;
}
