mod engine;

pub use engine::{DispatchConfig, DispatchEngine, DispatchError, DispatchReport, SweepReport};
