//! Token-bucket admission control.

pub mod admission;
pub mod bucket;
pub mod class;
pub mod eviction;
pub mod registry;

pub use admission::{AdmissionController, AdmissionPolicy, Decision, Outcome, RequestIdentity};
pub use bucket::{Consumption, Quota, TokenBucket};
pub use class::EndpointClass;
pub use eviction::BucketEvictionJob;
pub use registry::{BucketKey, BucketRegistry, Scope};
