use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use glide_api::{app, AppState};
use glide_core::payment::PaymentsApi;
use glide_core::refdata::ReferenceDataApi;
use glide_offer::{OfferService, TuningCache};
use glide_order::{OrderCleanupJob, OrderService};
use glide_store::{
    Config, DbClient, PgOrderRepository, RedisClient, RedisOfferRepository, RedisOrderCache,
    UpstreamClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const CLEANUP_OLDER_THAN_HOURS: i64 = 24;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "glide_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!("starting glide API on port {}", config.port);

    let db = DbClient::new(&config.database_url)
        .await
        .expect("failed to connect to Postgres");
    db.migrate().await.expect("failed to run migrations");

    let redis = RedisClient::new(&config.redis_url)
        .await
        .expect("failed to connect to Redis");

    let upstream = Arc::new(
        UpstreamClient::new(config.external_service_url.clone())
            .expect("failed to build upstream client"),
    );
    let refdata: Arc<dyn ReferenceDataApi> = upstream.clone();
    let payments: Arc<dyn PaymentsApi> = upstream;

    let offer_repo = Arc::new(RedisOfferRepository::new(redis.clone()));
    let order_repo = Arc::new(PgOrderRepository::new(db.pool.clone()));
    let order_cache: Arc<dyn glide_order::repository::OrderCache> =
        Arc::new(RedisOrderCache::new(redis));

    let tuning = Arc::new(TuningCache::new(refdata.clone()));
    tuning.clone().start().await;

    let offers = Arc::new(OfferService::new(
        offer_repo.clone(),
        refdata,
        tuning.clone(),
    ));
    let orders = Arc::new(OrderService::new(
        order_repo.clone(),
        offer_repo,
        payments,
        Some(order_cache),
        tuning.clone(),
    ));

    let cleanup = Arc::new(OrderCleanupJob::new(
        order_repo,
        chrono::Duration::hours(CLEANUP_OLDER_THAN_HOURS),
        CLEANUP_INTERVAL,
    ));
    cleanup.clone().start().await;

    let state = AppState { offers, orders };
    let router = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    cleanup.stop().await;
    tuning.stop().await;
    tracing::info!("shutdown complete");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install ctrl-c handler");
    tracing::info!("shutdown signal received");
}
