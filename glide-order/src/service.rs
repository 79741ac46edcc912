use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use glide_core::payment::PaymentsApi;
use glide_core::BoxError;
use glide_offer::repository::OfferRepository;
use glide_offer::tuning::TuningCache;
use tracing::warn;

use crate::models::{Order, OrderStatus};
use crate::repository::{FinishParams, OrderCache, OrderRepository};
use crate::singleflight::Group;

const ORDER_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("offer not found")]
    OfferNotFound,

    #[error("offer expired")]
    OfferExpired,

    #[error("offer already used")]
    OfferAlreadyUsed,

    #[error("user_id doesn't match offer")]
    InvalidUser,

    #[error("order not found")]
    NoSuchOrder,

    /// Finish on an already-terminal order; carries the current row so the
    /// caller can still render it.
    #[error("order not active")]
    NotActive(Box<Order>),

    #[error("payment hold failed")]
    HoldFailed,

    #[error("payments error: {0}")]
    Payments(#[source] BoxError),

    #[error("storage error: {0}")]
    Storage(#[source] BoxError),
}

#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub order_id: String,
    pub offer_id: String,
    pub user_id: String,
}

#[async_trait]
pub trait OrderApi: Send + Sync {
    async fn create_order(&self, req: CreateOrderRequest) -> Result<Order, OrderError>;

    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, OrderError>;

    async fn finish_order(&self, order_id: &str) -> Result<Order, OrderError>;
}

/// Order lifecycle engine: promote an offer to a charged order, serve hot
/// reads through the cache, and settle billing at return.
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    offers: Arc<dyn OfferRepository>,
    payments: Arc<dyn PaymentsApi>,
    cache: Option<Arc<dyn OrderCache>>,
    tuning: Arc<TuningCache>,
    flight: Group<Result<Option<Order>, String>>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        offers: Arc<dyn OfferRepository>,
        payments: Arc<dyn PaymentsApi>,
        cache: Option<Arc<dyn OrderCache>>,
        tuning: Arc<TuningCache>,
    ) -> Self {
        Self {
            orders,
            offers,
            payments,
            cache,
            tuning,
            flight: Group::new(),
        }
    }

    async fn cache_put(&self, order: &Order) {
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.set_order(order, ORDER_CACHE_TTL).await {
                warn!(order_id = %order.id, error = %err, "order cache write failed");
            }
        }
    }
}

#[async_trait]
impl OrderApi for OrderService {
    /// Two-phase create: consume the offer (atomic mark-used), hold the
    /// deposit, then durably write order + HOLD transaction. The
    /// client-supplied `order_id` is the idempotency key.
    async fn create_order(&self, req: CreateOrderRequest) -> Result<Order, OrderError> {
        if req.order_id.is_empty() {
            return Err(OrderError::MissingField("order_id"));
        }
        if req.offer_id.is_empty() {
            return Err(OrderError::MissingField("offer_id"));
        }
        if req.user_id.is_empty() {
            return Err(OrderError::MissingField("user_id"));
        }

        let existing = self
            .orders
            .get_order_by_id(&req.order_id)
            .await
            .map_err(OrderError::Storage)?;
        if let Some(order) = existing {
            return Ok(order);
        }

        let offer = self
            .offers
            .get_offer(&req.offer_id)
            .await
            .map_err(OrderError::Storage)?
            .ok_or(OrderError::OfferNotFound)?;

        if offer.is_expired() {
            return Err(OrderError::OfferExpired);
        }
        if offer.user_id != req.user_id {
            return Err(OrderError::InvalidUser);
        }

        let marked = self
            .offers
            .mark_offer_as_used(&req.offer_id)
            .await
            .map_err(OrderError::Storage)?;
        if !marked {
            return Err(OrderError::OfferAlreadyUsed);
        }

        // a failed hold leaves the offer marked-used: the client must
        // request a fresh offer rather than retry this one
        let hold = self
            .payments
            .hold(&req.user_id, &req.order_id, offer.deposit)
            .await
            .map_err(OrderError::Payments)?;
        if !hold.ok {
            return Err(OrderError::HoldFailed);
        }

        let order = Order {
            id: req.order_id.clone(),
            offer_id: req.offer_id.clone(),
            user_id: req.user_id.clone(),
            scooter_id: offer.scooter_id.clone(),
            status: OrderStatus::Active,
            start_time: Utc::now(),
            finish_time: None,
            duration_seconds: None,
            price_per_minute: offer.price_per_minute,
            price_unlock: offer.price_unlock,
            deposit: offer.deposit,
            total_amount: offer.price_unlock,
        };

        if let Err(err) = self.orders.create_order(&order, &hold.transaction_id).await {
            // compensate the successful hold before surfacing the failure
            if let Err(unhold_err) = self.payments.unhold(&req.order_id).await {
                warn!(order_id = %req.order_id, error = %unhold_err, "compensating unhold failed");
            }
            return Err(OrderError::Storage(err));
        }

        self.cache_put(&order).await;

        Ok(order)
    }

    /// Cache first, then a singleflighted repository read so concurrent
    /// misses for one id produce exactly one backing query.
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, OrderError> {
        if order_id.is_empty() {
            return Err(OrderError::MissingField("order_id"));
        }

        if let Some(cache) = &self.cache {
            if let Ok(Some(order)) = cache.get_order(order_id).await {
                return Ok(Some(order));
            }
        }

        let loaded = self
            .flight
            .run(order_id, || async move {
                let order = self
                    .orders
                    .get_order_by_id(order_id)
                    .await
                    .map_err(|err| err.to_string())?;
                if let Some(order) = &order {
                    self.cache_put(order).await;
                }
                Ok(order)
            })
            .await;

        loaded.map_err(|msg| OrderError::Storage(msg.into()))
    }

    /// Settles the ride: price the elapsed time, charge, release the hold,
    /// and commit the terminal transition with both ledger rows in one
    /// database transaction.
    async fn finish_order(&self, order_id: &str) -> Result<Order, OrderError> {
        if order_id.is_empty() {
            return Err(OrderError::MissingField("order_id"));
        }

        let order = self
            .orders
            .get_order_by_id(order_id)
            .await
            .map_err(OrderError::Storage)?
            .ok_or(OrderError::NoSuchOrder)?;
        if order.status.is_terminal() {
            return Err(OrderError::NotActive(Box::new(order)));
        }

        let now = Utc::now();
        let duration_seconds = (now - order.start_time).num_seconds().max(0);

        let threshold = self
            .tuning
            .snapshot()
            .await
            .incomplete_ride_threshold_seconds;

        // below the incomplete-ride threshold the ride is free; a zero
        // charge still goes through payments and still counts as a CLEAR
        let total_amount = if duration_seconds < threshold {
            0
        } else {
            let minutes = (duration_seconds + 59) / 60;
            order.price_unlock + minutes * order.price_per_minute
        };

        let charge_success = match self.payments.charge(order_id, total_amount).await {
            Ok(()) => true,
            Err(err) => {
                warn!(order_id, error = %err, "charge failed");
                false
            }
        };

        // the hold is only released once the charge went through
        let unhold_success = if charge_success {
            match self.payments.unhold(order_id).await {
                Ok(()) => true,
                Err(err) => {
                    warn!(order_id, error = %err, "unhold failed");
                    false
                }
            }
        } else {
            false
        };

        let final_status = if charge_success {
            OrderStatus::Finished
        } else {
            OrderStatus::PaymentFailed
        };

        self.orders
            .finish_order(
                order_id,
                FinishParams {
                    finish_time: now,
                    duration_seconds,
                    total_amount,
                    final_status,
                    charge_success,
                    unhold_success,
                    charge_tx_id: None,
                },
            )
            .await
            .map_err(OrderError::Storage)?;

        if let Some(cache) = &self.cache {
            if let Err(err) = cache.invalidate(order_id).await {
                warn!(order_id, error = %err, "order cache invalidation failed");
            }
        }

        let updated = self
            .orders
            .get_order_by_id(order_id)
            .await
            .map_err(OrderError::Storage)?
            .ok_or_else(|| OrderError::Storage("order vanished after finish".into()))?;

        self.cache_put(&updated).await;

        Ok(updated)
    }
}
