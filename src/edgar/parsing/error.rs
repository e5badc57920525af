use thiserror::Error;

use super::table::HoldingsTable;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("tag repair failed: {0}")]
    Repair(#[from] regex::Error),

    #[error("malformed markup after repair: {0}")]
    MalformedMarkup(#[from] roxmltree::Error),

    #[error("column {column} in row {row} is not an integer: {value:?}")]
    NumericConversion {
        column: &'static str,
        row: usize,
        value: Option<String>,
    },
}

/// Result of running one document through the extraction pipeline.
#[derive(Debug)]
pub enum ExtractOutcome {
    Table(HoldingsTable),
    /// Well-formed filing without any usable holdings rows.
    Empty,
    Failed(ExtractError),
}

impl ExtractOutcome {
    pub fn table(&self) -> Option<&HoldingsTable> {
        match self {
            ExtractOutcome::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn into_table(self) -> Option<HoldingsTable> {
        match self {
            ExtractOutcome::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ExtractOutcome::Empty)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ExtractOutcome::Failed(_))
    }
}
