pub mod cleanup;
pub mod models;
pub mod repository;
pub mod service;
pub mod singleflight;

pub use cleanup::OrderCleanupJob;
pub use models::{Order, OrderStatus, PaymentTransaction, TransactionStatus, TransactionType};
pub use repository::{FinishParams, OrderCache, OrderRepository};
pub use service::{CreateOrderRequest, OrderApi, OrderError, OrderService};
