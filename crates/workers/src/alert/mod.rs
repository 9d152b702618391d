mod store;

pub use store::{AlertError, AlertStore, Transitioned};
