//! HTTP API handlers for gmaking-growth

pub mod growth;
pub mod health;

pub use growth::growth_routes;
pub use health::health_routes;
