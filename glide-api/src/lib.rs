use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod offers;
pub mod orders;
pub mod state;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(offers::routes())
        .merge(orders::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}
