use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use glide_core::BoxError;
use glide_order::models::{
    Order, OrderStatus, PaymentTransaction, TransactionStatus, TransactionType,
};
use glide_order::repository::{FinishParams, OrderRepository};
use sqlx::{PgPool, Postgres, Transaction};

/// Durable order storage over PostgreSQL.
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: String,
    offer_id: String,
    user_id: String,
    scooter_id: String,
    price_per_minute: i64,
    price_unlock: i64,
    deposit: i64,
    total_amount: i64,
    status: String,
    start_time: DateTime<Utc>,
    finish_time: Option<DateTime<Utc>>,
    duration_seconds: Option<i64>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, BoxError> {
        Ok(Order {
            id: self.id,
            offer_id: self.offer_id,
            user_id: self.user_id,
            scooter_id: self.scooter_id,
            status: self.status.parse::<OrderStatus>()?,
            start_time: self.start_time,
            finish_time: self.finish_time,
            duration_seconds: self.duration_seconds,
            price_per_minute: self.price_per_minute,
            price_unlock: self.price_unlock,
            deposit: self.deposit,
            total_amount: self.total_amount,
        })
    }
}

const SELECT_ORDER: &str = "\
    SELECT id, offer_id, user_id, scooter_id, \
           price_per_minute, price_unlock, deposit, total_amount, \
           status, start_time, finish_time, duration_seconds \
    FROM orders";

/// Ledger rows get deterministic primary keys (`txn-{order}`,
/// `txn-clear-{order}`, `txn-refund-{order}`), so the one-HOLD /
/// one-CLEAR / one-REFUND invariant is enforced by the key itself.
async fn insert_transaction(
    tx: &mut Transaction<'_, Postgres>,
    row: &PaymentTransaction,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO payment_transactions (\
             id, order_id, user_id, transaction_type, \
             amount, status, external_transaction_id, error_message, created_at\
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(&row.id)
    .bind(&row.order_id)
    .bind(&row.user_id)
    .bind(row.transaction_type.as_str())
    .bind(row.amount)
    .bind(row.status.as_str())
    .bind(row.external_transaction_id.as_deref())
    .bind(row.error_message.as_deref())
    .bind(row.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    /// Order row and its HOLD ledger row commit together or not at all.
    async fn create_order(&self, order: &Order, hold_tx_id: &str) -> Result<(), BoxError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO orders (\
                 id, offer_id, user_id, scooter_id, \
                 price_per_minute, price_unlock, deposit, total_amount, \
                 status, start_time, created_at, updated_at\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(&order.id)
        .bind(&order.offer_id)
        .bind(&order.user_id)
        .bind(&order.scooter_id)
        .bind(order.price_per_minute)
        .bind(order.price_unlock)
        .bind(order.deposit)
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(order.start_time)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        insert_transaction(
            &mut tx,
            &PaymentTransaction {
                id: format!("txn-{}", order.id),
                order_id: order.id.clone(),
                user_id: order.user_id.clone(),
                transaction_type: TransactionType::Hold,
                amount: order.deposit,
                status: TransactionStatus::Success,
                external_transaction_id: Some(hold_tx_id.to_string()),
                error_message: None,
                created_at: now,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_order_by_id(&self, order_id: &str) -> Result<Option<Order>, BoxError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE id = $1"))
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(OrderRow::into_order).transpose()
    }

    async fn get_order_by_offer_id(&self, offer_id: &str) -> Result<Option<Order>, BoxError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "{SELECT_ORDER} WHERE offer_id = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(offer_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(OrderRow::into_order).transpose()
    }

    /// Terminal transition plus CLEAR and REFUND ledger rows in one
    /// transaction. The UPDATE matches only rows still ACTIVE, so a finish
    /// that lost the race changes nothing and errors out here.
    async fn finish_order(&self, order_id: &str, params: FinishParams) -> Result<(), BoxError> {
        let mut tx = self.pool.begin().await?;

        let updated: Option<(String, i64)> = sqlx::query_as(
            "UPDATE orders \
             SET finish_time = $2, duration_seconds = $3, total_amount = $4, \
                 status = $5, updated_at = $6 \
             WHERE id = $1 AND status = 'ACTIVE' \
             RETURNING user_id, deposit",
        )
        .bind(order_id)
        .bind(params.finish_time)
        .bind(params.duration_seconds)
        .bind(params.total_amount)
        .bind(params.final_status.as_str())
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((user_id, deposit)) = updated else {
            return Err("order is not active or does not exist".into());
        };

        let now = Utc::now();

        insert_transaction(
            &mut tx,
            &PaymentTransaction {
                id: format!("txn-clear-{order_id}"),
                order_id: order_id.to_string(),
                user_id: user_id.clone(),
                transaction_type: TransactionType::Clear,
                amount: params.total_amount,
                status: TransactionStatus::from_outcome(params.charge_success),
                external_transaction_id: params.charge_tx_id.clone(),
                error_message: None,
                created_at: now,
            },
        )
        .await?;

        insert_transaction(
            &mut tx,
            &PaymentTransaction {
                id: format!("txn-refund-{order_id}"),
                order_id: order_id.to_string(),
                user_id,
                transaction_type: TransactionType::Refund,
                amount: deposit,
                status: TransactionStatus::from_outcome(params.unhold_success),
                external_transaction_id: None,
                error_message: None,
                created_at: now,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_old_orders(&self, older_than: Duration) -> Result<Vec<Order>, BoxError> {
        let cutoff = Utc::now() - older_than;
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{SELECT_ORDER} \
             WHERE status IN ('FINISHED', 'CANCELLED', 'PAYMENT_FAILED') \
             AND created_at < $1"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    async fn delete_orders(&self, order_ids: &[String]) -> Result<(), BoxError> {
        if order_ids.is_empty() {
            return Ok(());
        }
        sqlx::query("DELETE FROM orders WHERE id = ANY($1)")
            .bind(order_ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
