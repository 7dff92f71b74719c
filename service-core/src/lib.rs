//! service-core: shared infrastructure for the CRM services.
pub mod config;
pub mod error;
pub mod observability;

pub use axum;
pub use mongodb;
pub use tracing;
pub use validator;
