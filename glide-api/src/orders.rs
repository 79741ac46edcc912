use axum::extract::rejection::JsonRejection;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use glide_order::models::Order;
use glide_order::service::{CreateOrderRequest, OrderError};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/{order_id}", get(get_order))
        .route("/orders/{order_id}/finish", post(finish_order))
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    pub order_id: Option<String>,
    pub offer_id: Option<String>,
    pub user_id: Option<String>,
}

/// POST /orders
/// Promotes an offer to an active order; `order_id` is the client-supplied
/// idempotency key.
async fn create_order(
    State(state): State<AppState>,
    body: Result<Json<CreateOrderBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let Json(body) = body.map_err(|_| AppError::BadRequest("invalid request body".into()))?;

    let order_id = require(body.order_id, "order_id")?;
    let offer_id = require(body.offer_id, "offer_id")?;
    let user_id = require(body.user_id, "user_id")?;

    let order = state
        .orders
        .create_order(CreateOrderRequest {
            order_id,
            offer_id,
            user_id,
        })
        .await
        .map_err(|err| match err {
            OrderError::MissingField(field) => AppError::BadRequest(format!("{field} is required")),
            OrderError::OfferNotFound => AppError::BadRequest("offer not found".into()),
            OrderError::OfferExpired => AppError::BadRequest("offer expired".into()),
            OrderError::OfferAlreadyUsed => AppError::BadRequest("offer already used".into()),
            OrderError::InvalidUser => AppError::BadRequest("invalid user".into()),
            other => AppError::Internal(other.to_string()),
        })?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders/{order_id}
async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .get_order(&order_id)
        .await
        .map_err(|err| AppError::Internal(err.to_string()))?
        .ok_or_else(|| AppError::NotFound("order not found".into()))?;

    Ok(Json(order))
}

/// POST /orders/{order_id}/finish
/// Settles the ride. A repeat call reports 409 without side effects.
async fn finish_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .finish_order(&order_id)
        .await
        .map_err(|err| match err {
            OrderError::NoSuchOrder => AppError::BadRequest("order not found".into()),
            OrderError::NotActive(_) => AppError::Conflict("order not active".into()),
            other => AppError::Internal(other.to_string()),
        })?;

    Ok(Json(order))
}

fn require(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{field} is required")))
}
