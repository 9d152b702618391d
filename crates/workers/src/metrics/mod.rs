pub mod dispatch_metrics;
pub mod exposition;
