use std::sync::Arc;

use glide_offer::service::OfferApi;
use glide_order::service::OrderApi;

#[derive(Clone)]
pub struct AppState {
    pub offers: Arc<dyn OfferApi>,
    pub orders: Arc<dyn OrderApi>,
}
