pub mod analysis;
pub mod health;
pub mod metrics;
pub mod rate_limit;
