mod admin;
mod alerts;
mod configurations;
pub mod error;
mod health;
mod metrics;
mod router;

pub use error::ApiError;
pub use router::{drain_dispatches, router, AppState};
