//! HTTP endpoints other than the protected resource itself.

pub mod health;
pub mod metrics;
pub mod payments;
