pub mod payment;
pub mod refdata;

/// Error type shared by repository and gateway traits.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
