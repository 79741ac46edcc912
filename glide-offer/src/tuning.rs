use std::sync::{Arc, RwLock};
use std::time::Duration;

use glide_core::refdata::{ReferenceDataApi, TuningKnobs};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const REFRESH_INTERVAL: Duration = Duration::from_secs(5);
const REFRESH_DEADLINE: Duration = Duration::from_secs(3);

/// Process-wide cache of tuning knobs, refreshed by a background poller.
///
/// Starts out on the cold-start defaults; the poller overwrites them with
/// live values every 5 seconds and keeps the previous value when the
/// upstream is unavailable.
pub struct TuningCache {
    refdata: Arc<dyn ReferenceDataApi>,
    current: RwLock<TuningKnobs>,
    poller: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl TuningCache {
    pub fn new(refdata: Arc<dyn ReferenceDataApi>) -> Self {
        Self {
            refdata,
            current: RwLock::new(TuningKnobs::default()),
            poller: Mutex::new(None),
        }
    }

    /// Current knobs.
    ///
    /// While the cache still holds the cold-start defaults (detected by the
    /// `incomplete_ride_threshold_seconds == 5` sentinel), the first reader
    /// fetches live values synchronously so early requests do not bill on
    /// defaults. A live payload whose threshold really is 5 keeps
    /// re-triggering this path; that quirk is inherited behavior.
    pub async fn snapshot(&self) -> TuningKnobs {
        let current = *self.current.read().expect("tuning lock poisoned");
        if current.incomplete_ride_threshold_seconds != 5 {
            return current;
        }

        match self.refdata.get_tuning().await {
            Ok(fresh) => {
                *self.current.write().expect("tuning lock poisoned") = fresh;
                fresh
            }
            Err(err) => {
                debug!(error = %err, "synchronous tuning fetch failed, keeping current values");
                current
            }
        }
    }

    /// Spawns the periodic refresh task; call once at boot.
    pub async fn start(self: Arc<Self>) {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let cache = Arc::clone(&self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => cache.refresh().await,
                    _ = stop_rx.changed() => {
                        info!("tuning poller stopped");
                        return;
                    }
                }
            }
        });

        *self.poller.lock().await = Some((stop_tx, handle));
    }

    /// Stops the poller and waits for it to exit.
    pub async fn stop(&self) {
        if let Some((stop_tx, handle)) = self.poller.lock().await.take() {
            let _ = stop_tx.send(true);
            let _ = handle.await;
        }
    }

    /// One refresh attempt with its own deadline. Upstream failure keeps
    /// the previous value.
    async fn refresh(&self) {
        let fetch = tokio::time::timeout(REFRESH_DEADLINE, self.refdata.get_tuning());
        match fetch.await {
            Ok(Ok(fresh)) => {
                *self.current.write().expect("tuning lock poisoned") = fresh;
            }
            Ok(Err(err)) => {
                debug!(error = %err, "tuning refresh failed, keeping current values");
            }
            Err(_) => {
                debug!("tuning refresh timed out, keeping current values");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use glide_core::refdata::{ScooterData, TariffZone, UserProfile};
    use glide_core::BoxError;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct TuningSource {
        fail: AtomicBool,
        calls: AtomicU32,
        knobs: RwLock<TuningKnobs>,
    }

    impl TuningSource {
        fn serving(knobs: TuningKnobs) -> Self {
            Self {
                fail: AtomicBool::new(false),
                calls: AtomicU32::new(0),
                knobs: RwLock::new(knobs),
            }
        }
    }

    #[async_trait]
    impl ReferenceDataApi for TuningSource {
        async fn get_scooter(&self, _: &str) -> Result<Option<ScooterData>, BoxError> {
            unimplemented!()
        }

        async fn get_zone(&self, _: &str) -> Result<Option<TariffZone>, BoxError> {
            unimplemented!()
        }

        async fn get_user_profile(&self, _: &str) -> Result<Option<UserProfile>, BoxError> {
            unimplemented!()
        }

        async fn get_tuning(&self) -> Result<TuningKnobs, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err("configs unavailable".into());
            }
            Ok(*self.knobs.read().unwrap())
        }
    }

    fn live_knobs() -> TuningKnobs {
        TuningKnobs {
            surge: 1.5,
            low_charge_discount: 0.6,
            low_charge_threshold_percent: 20,
            incomplete_ride_threshold_seconds: 10,
        }
    }

    #[tokio::test]
    async fn cold_start_reader_fetches_live_values() {
        let source = Arc::new(TuningSource::serving(live_knobs()));
        let cache = TuningCache::new(source.clone());

        let knobs = cache.snapshot().await;
        assert_eq!(knobs, live_knobs());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // no longer on defaults, so no further synchronous fetches
        let again = cache.snapshot().await;
        assert_eq!(again, live_knobs());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cold_start_fetch_failure_keeps_defaults() {
        let source = Arc::new(TuningSource::serving(live_knobs()));
        source.fail.store(true, Ordering::SeqCst);
        let cache = TuningCache::new(source);

        assert_eq!(cache.snapshot().await, TuningKnobs::default());
    }

    #[tokio::test]
    async fn refresh_failure_preserves_previous_values() {
        let source = Arc::new(TuningSource::serving(live_knobs()));
        let cache = TuningCache::new(source.clone());

        cache.refresh().await;
        source.fail.store(true, Ordering::SeqCst);
        cache.refresh().await;

        assert_eq!(cache.snapshot().await, live_knobs());
    }

    #[tokio::test]
    async fn live_threshold_of_five_keeps_refetching() {
        // the cold-start sentinel cannot tell these values apart
        let knobs = TuningKnobs {
            incomplete_ride_threshold_seconds: 5,
            ..live_knobs()
        };
        let source = Arc::new(TuningSource::serving(knobs));
        let cache = TuningCache::new(source.clone());

        cache.snapshot().await;
        cache.snapshot().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn poller_stop_waits_for_task() {
        let source = Arc::new(TuningSource::serving(live_knobs()));
        let cache = Arc::new(TuningCache::new(source.clone()));

        cache.clone().start().await;
        // first tick fires immediately
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.stop().await;

        assert!(source.calls.load(Ordering::SeqCst) >= 1);
        assert_eq!(cache.snapshot().await, live_knobs());
    }
}
