//! In-memory repositories backed by `DashMap`, used when no database is
//! configured and throughout the tests.

mod alerts;
mod configurations;
mod deliveries;

pub use alerts::MemoryAlertRepository;
pub use configurations::MemoryConfigurationRepository;
pub use deliveries::MemoryDeliveryRepository;
