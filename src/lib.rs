pub mod core;
pub mod edgar;
pub mod utils;

// Re-exports
pub use self::core::{Diagnostics, HoldingsConfig};
pub use edgar::parsing::{ExtractError, ExtractOutcome, HoldingsExtractor, HoldingsTable};
pub use utils::progress::ProgressTracker;
