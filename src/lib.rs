// Shared infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Templates and rendering
pub mod keyboard;
pub mod template;

// Delivery
pub mod notification;
pub mod resilience;
pub mod transport;
