pub mod builder;
pub mod dto;
pub mod ports;
pub mod rate_limiter;
pub mod use_cases;
