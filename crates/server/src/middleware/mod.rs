pub mod identity;
pub mod observe;
pub mod rate_limit;
