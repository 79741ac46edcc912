use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use glide_core::refdata::ReferenceDataApi;
use glide_core::BoxError;
use uuid::Uuid;

use crate::models::Offer;
use crate::pricing::{self, PricingInputs};
use crate::repository::OfferRepository;
use crate::tuning::TuningCache;
use crate::zone_cache::ZoneCache;

const OFFER_TTL_MINUTES: i64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum OfferError {
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    /// The scooter service is the one critical dependency: no offer
    /// without it.
    #[error("scooters unavailable")]
    ScootersUnavailable,

    #[error("scooter not found")]
    ScooterNotFound,

    /// Zone service down and nothing usable cached.
    #[error("zone unavailable")]
    ZoneUnavailable,

    #[error("offer storage failed: {0}")]
    Storage(#[source] BoxError),
}

#[derive(Debug, Clone)]
pub struct CreateOfferRequest {
    pub user_id: String,
    pub scooter_id: String,
}

#[async_trait]
pub trait OfferApi: Send + Sync {
    async fn create_offer(&self, req: CreateOfferRequest) -> Result<Offer, OfferError>;
}

/// Turns a (user, scooter) intent into a priced, idempotent offer.
pub struct OfferService {
    repo: Arc<dyn OfferRepository>,
    refdata: Arc<dyn ReferenceDataApi>,
    zones: ZoneCache,
    tuning: Arc<TuningCache>,
}

impl OfferService {
    pub fn new(
        repo: Arc<dyn OfferRepository>,
        refdata: Arc<dyn ReferenceDataApi>,
        tuning: Arc<TuningCache>,
    ) -> Self {
        let zones = ZoneCache::new(Arc::clone(&refdata));
        Self {
            repo,
            refdata,
            zones,
            tuning,
        }
    }
}

#[async_trait]
impl OfferApi for OfferService {
    /// Idempotent creation: a live offer for the same (user, scooter) is
    /// returned unchanged; otherwise reference data is fetched, priced and
    /// persisted under a fresh id.
    async fn create_offer(&self, req: CreateOfferRequest) -> Result<Offer, OfferError> {
        if req.user_id.is_empty() {
            return Err(OfferError::InvalidRequest("user_id is required"));
        }
        if req.scooter_id.is_empty() {
            return Err(OfferError::InvalidRequest("scooter_id is required"));
        }

        // the index shares the offer key's TTL, so a hit is always live
        let existing = self
            .repo
            .get_offer_by_user_scooter(&req.user_id, &req.scooter_id)
            .await
            .map_err(OfferError::Storage)?;
        if let Some(offer) = existing {
            return Ok(offer);
        }

        let scooter = self
            .refdata
            .get_scooter(&req.scooter_id)
            .await
            .map_err(|_| OfferError::ScootersUnavailable)?
            .ok_or(OfferError::ScooterNotFound)?;

        let zone = self
            .zones
            .get(&scooter.zone_id)
            .await
            .ok_or(OfferError::ZoneUnavailable)?;

        // user profile is optional: any failure means no privileges
        let (has_subscription, trusted) = match self.refdata.get_user_profile(&req.user_id).await {
            Ok(Some(profile)) => (profile.has_subscription, profile.trusted),
            _ => (false, false),
        };

        let knobs = self.tuning.snapshot().await;

        let priced = pricing::calculate(PricingInputs {
            zone_price_per_minute: zone.price_per_minute,
            zone_price_unlock: zone.price_unlock,
            zone_default_deposit: zone.default_deposit,
            surge: knobs.surge,
            low_charge_discount: knobs.low_charge_discount,
            low_charge_threshold_percent: knobs.low_charge_threshold_percent,
            scooter_charge_percent: scooter.charge,
            has_subscription,
            trusted,
        });

        let now = Utc::now();
        let offer = Offer {
            id: Uuid::new_v4().to_string(),
            user_id: req.user_id.clone(),
            scooter_id: req.scooter_id.clone(),
            zone_id: scooter.zone_id,
            price_per_minute: priced.price_per_minute,
            price_unlock: priced.price_unlock,
            deposit: priced.deposit,
            created_at: now,
            expires_at: now + Duration::minutes(OFFER_TTL_MINUTES),
        };

        // no cleanup on partial failure: the key TTLs reclaim orphans
        self.repo
            .save_offer(&offer)
            .await
            .map_err(OfferError::Storage)?;
        self.repo
            .set_offer_by_user_scooter(&req.user_id, &req.scooter_id, &offer.id)
            .await
            .map_err(OfferError::Storage)?;

        Ok(offer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glide_core::refdata::{ScooterData, TariffZone, TuningKnobs, UserProfile};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryOfferRepo {
        offers: Mutex<Vec<Offer>>,
        index: Mutex<Vec<(String, String, String)>>,
        save_failures: AtomicU32,
    }

    #[async_trait]
    impl OfferRepository for InMemoryOfferRepo {
        async fn get_offer(&self, offer_id: &str) -> Result<Option<Offer>, BoxError> {
            Ok(self
                .offers
                .lock()
                .unwrap()
                .iter()
                .find(|o| o.id == offer_id)
                .cloned())
        }

        async fn save_offer(&self, offer: &Offer) -> Result<(), BoxError> {
            if self.save_failures.load(Ordering::SeqCst) > 0 {
                self.save_failures.fetch_sub(1, Ordering::SeqCst);
                return Err("kv store down".into());
            }
            self.offers.lock().unwrap().push(offer.clone());
            Ok(())
        }

        async fn mark_offer_as_used(&self, _: &str) -> Result<bool, BoxError> {
            unimplemented!()
        }

        async fn get_offer_by_user_scooter(
            &self,
            user_id: &str,
            scooter_id: &str,
        ) -> Result<Option<Offer>, BoxError> {
            let offer_id = {
                let index = self.index.lock().unwrap();
                let Some((_, _, offer_id)) = index
                    .iter()
                    .find(|(u, s, _)| u == user_id && s == scooter_id)
                else {
                    return Ok(None);
                };
                offer_id.clone()
            };
            self.get_offer(&offer_id).await
        }

        async fn set_offer_by_user_scooter(
            &self,
            user_id: &str,
            scooter_id: &str,
            offer_id: &str,
        ) -> Result<(), BoxError> {
            self.index.lock().unwrap().push((
                user_id.to_string(),
                scooter_id.to_string(),
                offer_id.to_string(),
            ));
            Ok(())
        }
    }

    struct FakeRefData {
        scooter: Result<Option<ScooterData>, String>,
        zone: Result<Option<TariffZone>, String>,
        profile: Result<Option<UserProfile>, String>,
        tuning: Result<TuningKnobs, String>,
        scooter_calls: AtomicU32,
    }

    impl FakeRefData {
        fn healthy() -> Self {
            Self {
                scooter: Ok(Some(ScooterData {
                    id: "S1".into(),
                    zone_id: "Z1".into(),
                    charge: 80,
                })),
                zone: Ok(Some(TariffZone {
                    id: "Z1".into(),
                    price_per_minute: 10,
                    price_unlock: 20,
                    default_deposit: 100,
                })),
                profile: Ok(Some(UserProfile {
                    id: "U1".into(),
                    has_subscription: false,
                    trusted: false,
                })),
                tuning: Ok(TuningKnobs {
                    surge: 1.0,
                    low_charge_discount: 1.0,
                    low_charge_threshold_percent: 0,
                    incomplete_ride_threshold_seconds: 7,
                }),
                scooter_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ReferenceDataApi for FakeRefData {
        async fn get_scooter(&self, _: &str) -> Result<Option<ScooterData>, BoxError> {
            self.scooter_calls.fetch_add(1, Ordering::SeqCst);
            self.scooter.clone().map_err(Into::into)
        }

        async fn get_zone(&self, _: &str) -> Result<Option<TariffZone>, BoxError> {
            self.zone.clone().map_err(Into::into)
        }

        async fn get_user_profile(&self, _: &str) -> Result<Option<UserProfile>, BoxError> {
            self.profile.clone().map_err(Into::into)
        }

        async fn get_tuning(&self) -> Result<TuningKnobs, BoxError> {
            self.tuning.clone().map_err(Into::into)
        }
    }

    fn service_with(refdata: FakeRefData) -> (OfferService, Arc<InMemoryOfferRepo>) {
        let repo = Arc::new(InMemoryOfferRepo::default());
        let refdata: Arc<dyn ReferenceDataApi> = Arc::new(refdata);
        let tuning = Arc::new(TuningCache::new(Arc::clone(&refdata)));
        (
            OfferService::new(repo.clone(), refdata, tuning),
            repo,
        )
    }

    fn request() -> CreateOfferRequest {
        CreateOfferRequest {
            user_id: "U1".into(),
            scooter_id: "S1".into(),
        }
    }

    #[tokio::test]
    async fn creates_priced_offer_with_ten_minute_ttl() {
        let (service, repo) = service_with(FakeRefData::healthy());

        let offer = service.create_offer(request()).await.expect("offer");

        assert_eq!(offer.price_per_minute, 10);
        assert_eq!(offer.price_unlock, 20);
        assert_eq!(offer.deposit, 100);
        assert_eq!(offer.zone_id, "Z1");
        assert_eq!(offer.expires_at - offer.created_at, Duration::minutes(10));
        assert!(!offer.is_expired());

        assert_eq!(repo.offers.lock().unwrap().len(), 1);
        assert_eq!(repo.index.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_call_returns_existing_offer() {
        let (service, repo) = service_with(FakeRefData::healthy());

        let first = service.create_offer(request()).await.expect("offer");
        let second = service.create_offer(request()).await.expect("offer");

        assert_eq!(first.id, second.id);
        assert_eq!(repo.offers.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scooter_transport_error_is_fatal_and_writes_nothing() {
        let mut refdata = FakeRefData::healthy();
        refdata.scooter = Err("connection refused".into());
        let (service, repo) = service_with(refdata);

        let err = service.create_offer(request()).await.unwrap_err();
        assert!(matches!(err, OfferError::ScootersUnavailable));
        assert!(repo.offers.lock().unwrap().is_empty());
        assert!(repo.index.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_scooter_is_not_a_degradation() {
        let mut refdata = FakeRefData::healthy();
        refdata.scooter = Ok(None);
        let (service, _) = service_with(refdata);

        let err = service.create_offer(request()).await.unwrap_err();
        assert!(matches!(err, OfferError::ScooterNotFound));
    }

    #[tokio::test]
    async fn zone_outage_without_cache_fails() {
        let mut refdata = FakeRefData::healthy();
        refdata.zone = Err("zone service down".into());
        let (service, _) = service_with(refdata);

        let err = service.create_offer(request()).await.unwrap_err();
        assert!(matches!(err, OfferError::ZoneUnavailable));
    }

    #[tokio::test]
    async fn profile_outage_means_no_privileges() {
        let mut refdata = FakeRefData::healthy();
        refdata.profile = Err("profile service down".into());
        let (service, _) = service_with(refdata);

        let offer = service.create_offer(request()).await.expect("offer");
        assert_eq!(offer.price_unlock, 20);
        assert_eq!(offer.deposit, 100);
    }

    #[tokio::test]
    async fn empty_fields_are_rejected_before_any_lookup() {
        let (service, _) = service_with(FakeRefData::healthy());

        let err = service
            .create_offer(CreateOfferRequest {
                user_id: "".into(),
                scooter_id: "S1".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OfferError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn save_failure_surfaces_without_cleanup() {
        let (service, repo) = service_with(FakeRefData::healthy());
        repo.save_failures.store(1, Ordering::SeqCst);

        let err = service.create_offer(request()).await.unwrap_err();
        assert!(matches!(err, OfferError::Storage(_)));
        assert!(repo.index.lock().unwrap().is_empty());
    }
}
