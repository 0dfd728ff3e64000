pub mod config;
pub mod design;
pub mod error;
pub mod telemetry;
