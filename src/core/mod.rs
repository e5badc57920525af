pub mod config;
pub mod logging;

pub use config::HoldingsConfig;
pub use logging::{Diagnostics, FileSink, LogSink, MemorySink, TargetSink};
