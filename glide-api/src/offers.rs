use axum::extract::rejection::JsonRejection;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use glide_offer::models::Offer;
use glide_offer::service::{CreateOfferRequest, OfferError};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/offers", post(create_offer))
}

#[derive(Debug, Deserialize)]
pub struct CreateOfferBody {
    pub user_id: Option<String>,
    pub scooter_id: Option<String>,
}

/// POST /offers
/// Creates (or returns the existing live) offer for a user and scooter.
async fn create_offer(
    State(state): State<AppState>,
    body: Result<Json<CreateOfferBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Offer>), AppError> {
    let Json(body) = body.map_err(|_| AppError::BadRequest("invalid request body".into()))?;

    let user_id = body
        .user_id
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest("user_id is required".into()))?;
    let scooter_id = body
        .scooter_id
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest("scooter_id is required".into()))?;

    let offer = state
        .offers
        .create_offer(CreateOfferRequest {
            user_id,
            scooter_id,
        })
        .await
        .map_err(|err| match err {
            OfferError::ScootersUnavailable => {
                AppError::ServiceUnavailable("scooters service unavailable".into())
            }
            OfferError::ZoneUnavailable => {
                AppError::ServiceUnavailable("zone service unavailable".into())
            }
            OfferError::InvalidRequest(field) => AppError::BadRequest(field.to_string()),
            OfferError::ScooterNotFound | OfferError::Storage(_) => {
                AppError::BadRequest("unable to create offer".into())
            }
        })?;

    Ok((StatusCode::CREATED, Json(offer)))
}
