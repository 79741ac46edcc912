pub mod app_config;
pub mod database;
pub mod external;
pub mod offer_repo;
pub mod order_cache;
pub mod order_repo;
pub mod redis_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use external::UpstreamClient;
pub use offer_repo::RedisOfferRepository;
pub use order_cache::RedisOrderCache;
pub use order_repo::PgOrderRepository;
pub use redis_repo::RedisClient;
