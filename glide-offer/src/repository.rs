use async_trait::async_trait;
use glide_core::BoxError;

use crate::models::Offer;

/// Offer storage over the key-value store.
///
/// The store owns offer lifetime: every key carries a TTL derived from the
/// offer's `expires_at`, and the `used` sentinel written by
/// `mark_offer_as_used` is strictly monotonic (set once, never cleared).
#[async_trait]
pub trait OfferRepository: Send + Sync {
    /// Returns `Ok(None)` when the offer key is missing or expired.
    async fn get_offer(&self, offer_id: &str) -> Result<Option<Offer>, BoxError>;

    /// Stores the offer with TTL `expires_at - now`. Fails if the offer is
    /// already expired at the time of the call.
    async fn save_offer(&self, offer: &Offer) -> Result<(), BoxError>;

    /// Atomically sets the used sentinel if-not-exists. Returns `false`
    /// when another caller already consumed the offer.
    async fn mark_offer_as_used(&self, offer_id: &str) -> Result<bool, BoxError>;

    /// Reads the (user, scooter) index and resolves it to the offer.
    async fn get_offer_by_user_scooter(
        &self,
        user_id: &str,
        scooter_id: &str,
    ) -> Result<Option<Offer>, BoxError>;

    /// Writes the (user, scooter) index with TTL mirrored from the offer key.
    async fn set_offer_by_user_scooter(
        &self,
        user_id: &str,
        scooter_id: &str,
        offer_id: &str,
    ) -> Result<(), BoxError>;
}
