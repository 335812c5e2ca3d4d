pub mod metrics;
pub mod rate_limiting;

pub use metrics::metrics_middleware;
pub use rate_limiting::{rate_limit_middleware, remote_address};
