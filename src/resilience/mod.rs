pub mod circuit_breaker;
pub mod metrics;
pub mod rate_limit;
pub mod retry;
pub mod timeout;

pub use circuit_breaker::*;
pub use metrics::*;
pub use rate_limit::*;
pub use retry::*;
pub use timeout::*;
