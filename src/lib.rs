// Core modules
pub mod execution;
pub mod gateway;
pub mod indicators;
pub mod models;
pub mod risk;
pub mod settings;
pub mod strategy;

// Re-export commonly used types
pub use execution::{CycleOutcome, Engine};
pub use gateway::{Gateway, GatewayError};
pub use models::*;
pub use settings::{ConfigError, StrategyConfig, Variant};
pub use strategy::{GateKind, Pipeline, Rejection};
