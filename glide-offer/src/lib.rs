pub mod models;
pub mod pricing;
pub mod repository;
pub mod service;
pub mod tuning;
pub mod zone_cache;

pub use models::Offer;
pub use repository::OfferRepository;
pub use service::{CreateOfferRequest, OfferApi, OfferError, OfferService};
pub use tuning::TuningCache;
pub use zone_cache::ZoneCache;
