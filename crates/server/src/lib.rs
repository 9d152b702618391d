pub mod channels;
pub mod config;
pub mod metrics;
pub mod middleware;
pub mod ratelimit;
pub mod rest;
