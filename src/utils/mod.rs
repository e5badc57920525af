pub mod http;
pub mod progress;
pub mod rate_limit;

pub use progress::ProgressTracker;
pub use rate_limit::RateLimiter;
