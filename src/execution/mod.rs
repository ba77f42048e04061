// Order execution and the polling engine
pub mod engine;
pub mod executor;

pub use engine::{CycleOutcome, Engine};
pub use executor::{ExecutionResult, Executor};
