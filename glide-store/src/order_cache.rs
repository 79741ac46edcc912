use std::time::Duration;

use async_trait::async_trait;
use glide_core::BoxError;
use glide_order::models::Order;
use glide_order::repository::OrderCache;
use redis::AsyncCommands;

use crate::redis_repo::RedisClient;

/// Read-through cache for hot order reads, keyed `order:{id}`.
pub struct RedisOrderCache {
    redis: RedisClient,
}

impl RedisOrderCache {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }
}

fn key_order(order_id: &str) -> String {
    format!("order:{order_id}")
}

#[async_trait]
impl OrderCache for RedisOrderCache {
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, BoxError> {
        let mut conn = self.redis.connection().await?;
        let payload: Option<Vec<u8>> = conn.get(key_order(order_id)).await?;
        match payload {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn set_order(&self, order: &Order, ttl: Duration) -> Result<(), BoxError> {
        if order.id.is_empty() {
            return Err("invalid order".into());
        }
        let payload = serde_json::to_vec(order)?;
        let mut conn = self.redis.connection().await?;
        conn.set_ex::<_, _, ()>(key_order(&order.id), payload, ttl.as_secs())
            .await?;
        Ok(())
    }

    async fn invalidate(&self, order_id: &str) -> Result<(), BoxError> {
        let mut conn = self.redis.connection().await?;
        conn.del::<_, ()>(key_order(order_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_layout() {
        assert_eq!(key_order("O1"), "order:O1");
    }
}
