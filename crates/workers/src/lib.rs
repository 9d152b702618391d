pub mod alert;
pub mod delivery;
pub mod dispatch;
pub mod health;
pub mod metrics;
pub mod notifier;
pub mod scheduler;
pub mod storage;
pub mod store;
