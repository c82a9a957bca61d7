//! HTTP API handlers for aigd-analyzer

pub mod analyze;
pub mod health;
pub mod status;

pub use analyze::analyze_routes;
pub use health::health_routes;
pub use status::status_routes;
