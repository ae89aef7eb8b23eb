//! HTTP API handlers for exoseer-vet

pub mod analysis;
pub mod explain;
pub mod health;
pub mod targets;

pub use analysis::analysis_routes;
pub use explain::explain_routes;
pub use health::health_routes;
pub use targets::target_routes;
