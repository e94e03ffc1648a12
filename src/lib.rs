pub mod api;
pub mod app;
pub mod config;
pub mod downstream;
pub mod error;
pub mod logging;
pub mod observability;
pub mod resilience;
pub mod simulator;

pub use error::{ErrorKind, ResilienceError};
