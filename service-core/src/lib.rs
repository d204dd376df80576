//! service-core: Shared infrastructure for the identity admission services.
pub mod config;
pub mod error;
pub mod observability;
pub mod utils;

pub use axum;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;
