//! Triage and multi-stage analysis of a candidate batch

pub mod config;
mod controller;
mod orchestrator;
pub mod prompt;
mod single_flight;

pub use config::{ConfigError, PipelineConfig, ProviderConfig};
pub use controller::{triage_and_analyze, PipelineController};
pub use single_flight::SingleFlight;
