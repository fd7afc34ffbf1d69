// Sentra - AI production observability and anomaly engine
// Library exports

pub mod alerts;
pub mod config;
pub mod cost;
pub mod drift;
pub mod errors;
pub mod metrics;
pub mod pipeline;
pub mod risk;
pub mod telemetry;
pub mod threat;
pub mod window;
