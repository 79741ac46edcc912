use std::time::Duration;

use async_trait::async_trait;
use glide_core::payment::{HoldOutcome, PaymentsApi};
use glide_core::refdata::{ReferenceDataApi, ScooterData, TariffZone, TuningKnobs, UserProfile};
use glide_core::BoxError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

const CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for the reference data and payments services. Both live
/// behind one base URL; every call carries the 5-second client timeout.
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(CALL_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// GET an entity by id: 200 parses, 404 is an absent entity, anything
    /// else is an error.
    async fn get_entity<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        id: &str,
    ) -> Result<Option<T>, BoxError> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .query(&[("id", id)])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::OK => Ok(Some(response.json().await?)),
            status => Err(format!("{path} unexpected status: {status}").into()),
        }
    }

    async fn post_payment<B: Serialize>(&self, path: &str, body: &B) -> Result<(), BoxError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(format!("{path} unexpected status: {}", response.status()).into());
        }
        Ok(())
    }
}

/// `/configs` payload; missing keys take the wire-level fallbacks, which
/// are not the process cold-start defaults.
#[derive(Deserialize)]
struct TuningPayload {
    surge: Option<f64>,
    low_charge_discount: Option<f64>,
    low_charge_threshold_percent: Option<i32>,
    incomplete_ride_threshold_seconds: Option<i64>,
}

#[derive(Serialize)]
struct HoldRequest<'a> {
    user_id: &'a str,
    order_id: &'a str,
    amount: i64,
}

#[derive(Serialize)]
struct ChargeRequest<'a> {
    order_id: &'a str,
    amount: i64,
}

#[derive(Serialize)]
struct UnholdRequest<'a> {
    order_id: &'a str,
}

#[async_trait]
impl ReferenceDataApi for UpstreamClient {
    async fn get_scooter(&self, scooter_id: &str) -> Result<Option<ScooterData>, BoxError> {
        self.get_entity("/scooter-data", scooter_id).await
    }

    async fn get_zone(&self, zone_id: &str) -> Result<Option<TariffZone>, BoxError> {
        self.get_entity("/tariff-zone-data", zone_id).await
    }

    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, BoxError> {
        self.get_entity("/user-profile", user_id).await
    }

    async fn get_tuning(&self) -> Result<TuningKnobs, BoxError> {
        let response = self
            .http
            .get(format!("{}/configs", self.base_url))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(format!("/configs unexpected status: {}", response.status()).into());
        }

        let payload: TuningPayload = response.json().await?;
        Ok(TuningKnobs {
            surge: payload.surge.unwrap_or(1.0),
            low_charge_discount: payload.low_charge_discount.unwrap_or(1.0),
            low_charge_threshold_percent: payload.low_charge_threshold_percent.unwrap_or(0),
            incomplete_ride_threshold_seconds: payload
                .incomplete_ride_threshold_seconds
                .unwrap_or(0),
        })
    }
}

#[async_trait]
impl PaymentsApi for UpstreamClient {
    async fn hold(
        &self,
        user_id: &str,
        order_id: &str,
        amount: i64,
    ) -> Result<HoldOutcome, BoxError> {
        let response = self
            .http
            .post(format!("{}/hold-money-for-order", self.base_url))
            .json(&HoldRequest {
                user_id,
                order_id,
                amount,
            })
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(format!(
                "/hold-money-for-order unexpected status: {}",
                response.status()
            )
            .into());
        }

        Ok(response.json().await?)
    }

    async fn charge(&self, order_id: &str, amount: i64) -> Result<(), BoxError> {
        self.post_payment("/clear-money-for-order", &ChargeRequest { order_id, amount })
            .await
    }

    async fn unhold(&self, order_id: &str) -> Result<(), BoxError> {
        self.post_payment("/unhold-money-for-order", &UnholdRequest { order_id })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuning_payload_falls_back_per_missing_key() {
        let payload: TuningPayload = serde_json::from_str(r#"{"surge": 2.0}"#).unwrap();
        assert_eq!(payload.surge, Some(2.0));
        assert_eq!(payload.low_charge_discount, None);
        assert_eq!(payload.incomplete_ride_threshold_seconds, None);
    }

    #[test]
    fn user_profile_wire_spelling_is_preserved() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"id": "U1", "has_subscribtion": true, "trusted": false}"#)
                .unwrap();
        assert!(profile.has_subscription);
        assert!(!profile.trusted);
    }
}
