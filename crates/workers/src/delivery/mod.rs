mod tracker;

pub use tracker::{next_retry_delay, DeliveryTracker};
