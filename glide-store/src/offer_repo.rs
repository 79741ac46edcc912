use async_trait::async_trait;
use chrono::Utc;
use glide_core::BoxError;
use glide_offer::models::Offer;
use glide_offer::repository::OfferRepository;
use redis::AsyncCommands;

use crate::redis_repo::RedisClient;

/// TTL used for the used-sentinel and index keys when the offer key's
/// remaining TTL cannot be read (missing key or no expiry).
const FALLBACK_TTL_SECONDS: u64 = 5 * 60;

/// Offer storage over Redis. Keys:
/// `offer:{id}` payload, `offer:{id}:used` consumption sentinel,
/// `offer_idx:user:{u}:scooter:{s}` secondary index; all share the offer's
/// TTL so the whole record set expires together.
pub struct RedisOfferRepository {
    redis: RedisClient,
}

impl RedisOfferRepository {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }

    /// Remaining TTL of the offer key in seconds, with the safety-net
    /// fallback for missing keys and keys without expiry.
    async fn mirrored_ttl(&self, offer_id: &str) -> Result<u64, BoxError> {
        let mut conn = self.redis.connection().await?;
        let ttl: i64 = conn.ttl(key_offer(offer_id)).await?;
        Ok(if ttl <= 0 {
            FALLBACK_TTL_SECONDS
        } else {
            ttl as u64
        })
    }
}

fn key_offer(offer_id: &str) -> String {
    format!("offer:{offer_id}")
}

fn key_offer_used(offer_id: &str) -> String {
    format!("offer:{offer_id}:used")
}

fn key_idx_user_scooter(user_id: &str, scooter_id: &str) -> String {
    format!("offer_idx:user:{user_id}:scooter:{scooter_id}")
}

#[async_trait]
impl OfferRepository for RedisOfferRepository {
    async fn get_offer(&self, offer_id: &str) -> Result<Option<Offer>, BoxError> {
        let mut conn = self.redis.connection().await?;
        let payload: Option<Vec<u8>> = conn.get(key_offer(offer_id)).await?;
        match payload {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save_offer(&self, offer: &Offer) -> Result<(), BoxError> {
        if offer.id.is_empty() {
            return Err("invalid offer".into());
        }

        let now = Utc::now();
        if now > offer.expires_at {
            return Err("offer already expired".into());
        }
        // guarantee a minimal positive TTL
        let ttl_seconds = (offer.expires_at - now).num_seconds().max(1) as u64;

        let payload = serde_json::to_vec(offer)?;
        let mut conn = self.redis.connection().await?;
        conn.set_ex::<_, _, ()>(key_offer(&offer.id), payload, ttl_seconds)
            .await?;
        Ok(())
    }

    async fn mark_offer_as_used(&self, offer_id: &str) -> Result<bool, BoxError> {
        let ttl_seconds = self.mirrored_ttl(offer_id).await?;
        let mut conn = self.redis.connection().await?;

        // SET NX: first writer wins, and only the first
        let outcome: Option<String> = redis::cmd("SET")
            .arg(key_offer_used(offer_id))
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut *conn)
            .await?;

        Ok(outcome.is_some())
    }

    async fn get_offer_by_user_scooter(
        &self,
        user_id: &str,
        scooter_id: &str,
    ) -> Result<Option<Offer>, BoxError> {
        let mut conn = self.redis.connection().await?;
        let offer_id: Option<String> = conn.get(key_idx_user_scooter(user_id, scooter_id)).await?;
        match offer_id {
            Some(offer_id) => self.get_offer(&offer_id).await,
            None => Ok(None),
        }
    }

    async fn set_offer_by_user_scooter(
        &self,
        user_id: &str,
        scooter_id: &str,
        offer_id: &str,
    ) -> Result<(), BoxError> {
        let ttl_seconds = self.mirrored_ttl(offer_id).await?;
        let mut conn = self.redis.connection().await?;
        conn.set_ex::<_, _, ()>(
            key_idx_user_scooter(user_id, scooter_id),
            offer_id,
            ttl_seconds,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_matches_the_store_contract() {
        assert_eq!(key_offer("abc"), "offer:abc");
        assert_eq!(key_offer_used("abc"), "offer:abc:used");
        assert_eq!(
            key_idx_user_scooter("u1", "s2"),
            "offer_idx:user:u1:scooter:s2"
        );
    }
}
