pub mod auth;
pub mod http_metrics;
pub mod role;
