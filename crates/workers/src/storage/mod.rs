//! Postgres implementations of the repository traits. Each table keeps the
//! full record as JSONB next to the columns used for filtering.

mod alerts;
mod configurations;
mod deliveries;
pub mod migrator;
mod pool;

pub use alerts::PgAlertRepository;
pub use configurations::PgConfigurationRepository;
pub use deliveries::PgDeliveryRepository;
pub use pool::create_pool;

use riskwatch_common::repository::RepoError;

pub(crate) fn backend(e: sqlx::Error) -> RepoError {
    RepoError::Backend(e.to_string())
}
