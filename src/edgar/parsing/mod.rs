pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod repair;
pub mod table;
pub mod tree;

#[cfg(test)]
pub(crate) mod tests;

pub use error::{ExtractError, ExtractOutcome};
pub use metadata::{extract_fields, FilingMetadata};
pub use pipeline::HoldingsExtractor;
pub use repair::repair;
pub use table::{collect_blocks, reduce, HoldingRow, HoldingsTable, RecordBlock};
pub use tree::{local_name, parse_markup, MarkupNode, MarkupTree};
