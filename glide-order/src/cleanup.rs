use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::repository::OrderRepository;

const ITERATION_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// Periodic sweeper that deletes terminal orders older than a threshold.
/// One instance per process; errors are logged and never propagate.
pub struct OrderCleanupJob {
    repo: Arc<dyn OrderRepository>,
    older_than: chrono::Duration,
    interval: Duration,
    worker: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl OrderCleanupJob {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        older_than: chrono::Duration,
        interval: Duration,
    ) -> Self {
        Self {
            repo,
            older_than,
            interval,
            worker: Mutex::new(None),
        }
    }

    /// Spawns the sweep loop; the first sweep runs immediately.
    pub async fn start(self: Arc<Self>) {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let job = Arc::clone(&self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(job.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => job.sweep().await,
                    _ = stop_rx.changed() => {
                        info!("order cleanup job stopped");
                        return;
                    }
                }
            }
        });

        *self.worker.lock().await = Some((stop_tx, handle));
    }

    /// Signals the loop and waits for the in-flight iteration to complete.
    pub async fn stop(&self) {
        if let Some((stop_tx, handle)) = self.worker.lock().await.take() {
            let _ = stop_tx.send(true);
            let _ = handle.await;
        }
    }

    async fn sweep(&self) {
        if tokio::time::timeout(ITERATION_DEADLINE, self.sweep_once())
            .await
            .is_err()
        {
            error!("order cleanup iteration timed out");
        }
    }

    async fn sweep_once(&self) {
        let started = std::time::Instant::now();
        info!(older_than_hours = self.older_than.num_hours(), "starting order cleanup");

        let old_orders = match self.repo.get_old_orders(self.older_than).await {
            Ok(orders) => orders,
            Err(err) => {
                error!(error = %err, "failed to get old orders");
                return;
            }
        };

        if old_orders.is_empty() {
            info!(orders_deleted = 0, elapsed_ms = started.elapsed().as_millis() as u64, "no old orders to delete");
            return;
        }

        for order in &old_orders {
            match serde_json::to_string(order) {
                Ok(payload) => info!(
                    order_id = %order.id,
                    user_id = %order.user_id,
                    status = order.status.as_str(),
                    order_data = %payload,
                    "deleting old order"
                ),
                Err(err) => warn!(order_id = %order.id, error = %err, "failed to serialize order for logging"),
            }
        }

        let ids: Vec<String> = old_orders.iter().map(|o| o.id.clone()).collect();
        if let Err(err) = self.repo.delete_orders(&ids).await {
            error!(error = %err, orders_count = ids.len(), "failed to delete orders");
            return;
        }

        info!(
            orders_deleted = ids.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "order cleanup completed"
        );
    }
}
