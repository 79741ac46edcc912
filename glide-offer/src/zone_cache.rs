use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use glide_core::refdata::{ReferenceDataApi, TariffZone};
use tracing::warn;

const ZONE_CACHE_TTL_MINUTES: i64 = 10;

struct ZoneEntry {
    zone: TariffZone,
    expires_at: DateTime<Utc>,
}

/// TTL map over tariff zones, protecting offer creation from zone-service
/// flaps. Zones change slowly, so a stale entry beats a failed offer.
pub struct ZoneCache {
    refdata: Arc<dyn ReferenceDataApi>,
    entries: RwLock<HashMap<String, ZoneEntry>>,
    ttl: Duration,
}

impl ZoneCache {
    pub fn new(refdata: Arc<dyn ReferenceDataApi>) -> Self {
        Self {
            refdata,
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::minutes(ZONE_CACHE_TTL_MINUTES),
        }
    }

    /// Returns the zone from cache or upstream, or `None` when the zone
    /// service is unavailable and nothing usable is cached.
    pub async fn get(&self, zone_id: &str) -> Option<TariffZone> {
        // `now` is captured before the upstream call on purpose: an entry
        // that expires while the call is in flight still serves as fallback.
        let now = Utc::now();

        if let Some(zone) = self.read_unexpired(zone_id, now) {
            return Some(zone);
        }

        match self.refdata.get_zone(zone_id).await {
            Ok(Some(zone)) => {
                let mut entries = self.entries.write().expect("zone cache lock poisoned");
                entries.insert(
                    zone_id.to_string(),
                    ZoneEntry {
                        zone: zone.clone(),
                        expires_at: Utc::now() + self.ttl,
                    },
                );
                Some(zone)
            }
            Ok(None) => self.read_unexpired(zone_id, now),
            Err(err) => {
                warn!(zone_id, error = %err, "zone fetch failed, trying cache fallback");
                self.read_unexpired(zone_id, now)
            }
        }
    }

    fn read_unexpired(&self, zone_id: &str, now: DateTime<Utc>) -> Option<TariffZone> {
        let entries = self.entries.read().expect("zone cache lock poisoned");
        entries
            .get(zone_id)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.zone.clone())
    }
}
