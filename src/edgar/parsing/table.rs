use indexmap::IndexMap;

use super::error::ExtractError;
use super::metadata::FilingMetadata;
use super::tree::MarkupTree;

/// Tag fragment that opens a new holdings entry.
pub const BLOCK_MARKER: &str = "infoTable";

pub const VALUE: &str = "value";
pub const SHARES: &str = "sshPrnamt";
pub const SOLE: &str = "Sole";
pub const SHARED: &str = "Shared";
pub const NONE: &str = "None";

pub const NUMERIC_COLUMNS: [&str; 5] = [VALUE, SHARES, SOLE, SHARED, NONE];

/// Reported values are in thousands of dollars.
pub const VALUE_SCALE: i64 = 1000;

/// Local field name to text, in first-appearance order.
pub type RecordBlock = IndexMap<String, String>;

/// Groups leaf fields under each block marker. A repeated field overwrites
/// the earlier value but keeps its position.
pub fn collect_blocks(tree: &MarkupTree) -> Vec<RecordBlock> {
    let mut blocks = Vec::new();
    let mut current = RecordBlock::new();
    let mut recording = false;

    for node in tree.iter() {
        if node.tag.contains(BLOCK_MARKER) {
            recording = true;
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else if recording && node.is_leaf {
            let name = node.local_name();
            if !name.is_empty() {
                let text = node.text.as_deref().unwrap_or("").trim();
                current.insert(name.to_string(), text.to_string());
            }
        }
    }

    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoldingRow {
    /// Source fields other than the numeric columns.
    pub fields: IndexMap<String, String>,
    pub value: i64,
    pub shares: i64,
    pub sole: i64,
    pub shared: i64,
    pub none: i64,
    pub weight: Option<f64>,
    pub per_share: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoldingsTable {
    columns: Vec<String>,
    rows: Vec<HoldingRow>,
    total_value: i64,
    metadata: Option<FilingMetadata>,
}

impl HoldingsTable {
    /// `Ok(None)` when no block carries any field.
    pub fn from_blocks(blocks: Vec<RecordBlock>) -> Result<Option<Self>, ExtractError> {
        let blocks: Vec<RecordBlock> = blocks.into_iter().filter(|b| !b.is_empty()).collect();
        if blocks.is_empty() {
            return Ok(None);
        }

        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(blocks.len());

        for (idx, mut block) in blocks.into_iter().enumerate() {
            let value = take_integer(&mut block, VALUE, idx)?
                .checked_mul(VALUE_SCALE)
                .ok_or(ExtractError::NumericConversion {
                    column: VALUE,
                    row: idx,
                    value: None,
                })?;
            let shares = take_integer(&mut block, SHARES, idx)?;
            let sole = take_integer(&mut block, SOLE, idx)?;
            let shared = take_integer(&mut block, SHARED, idx)?;
            let none = take_integer(&mut block, NONE, idx)?;

            for name in block.keys() {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }

            rows.push(HoldingRow {
                fields: block,
                value,
                shares,
                sole,
                shared,
                none,
                weight: None,
                per_share: if shares == 0 {
                    None
                } else {
                    Some(value as f64 / shares as f64)
                },
            });
        }

        let total = rows
            .iter()
            .enumerate()
            .try_fold(0i64, |acc, (idx, row)| {
                acc.checked_add(row.value)
                    .ok_or_else(|| ExtractError::NumericConversion {
                        column: VALUE,
                        row: idx,
                        value: Some(row.value.to_string()),
                    })
            })?;
        if total != 0 {
            for row in rows.iter_mut() {
                row.weight = Some(row.value as f64 / total as f64);
            }
        }

        Ok(Some(Self {
            columns,
            rows,
            total_value: total,
            metadata: None,
        }))
    }

    pub fn with_metadata(mut self, metadata: FilingMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn metadata(&self) -> Option<&FilingMetadata> {
        self.metadata.as_ref()
    }

    pub fn rows(&self) -> &[HoldingRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_value(&self) -> i64 {
        self.total_value
    }

    /// Output header: source fields, numeric and derived columns, then metadata.
    pub fn header(&self) -> Vec<String> {
        let mut header = self.columns.clone();
        header.extend(
            NUMERIC_COLUMNS
                .iter()
                .chain(["wt", "perSh"].iter())
                .map(|c| c.to_string()),
        );
        if self.metadata.is_some() {
            header.extend(FilingMetadata::COLUMNS.iter().map(|c| c.to_string()));
        }
        header
    }

    /// One flat record per row, keyed by [`header`](Self::header).
    pub fn records(&self) -> Vec<IndexMap<String, String>> {
        let metadata = self.metadata.as_ref().map(FilingMetadata::values);
        self.rows
            .iter()
            .map(|row| {
                let mut record = IndexMap::new();
                for column in &self.columns {
                    let value = row.fields.get(column).cloned().unwrap_or_default();
                    record.insert(column.clone(), value);
                }
                record.insert(VALUE.to_string(), row.value.to_string());
                record.insert(SHARES.to_string(), row.shares.to_string());
                record.insert(SOLE.to_string(), row.sole.to_string());
                record.insert(SHARED.to_string(), row.shared.to_string());
                record.insert(NONE.to_string(), row.none.to_string());
                record.insert("wt".to_string(), format_optional(row.weight));
                record.insert("perSh".to_string(), format_optional(row.per_share));
                if let Some(values) = &metadata {
                    for (column, value) in FilingMetadata::COLUMNS.iter().zip(values) {
                        record.insert(column.to_string(), value.clone());
                    }
                }
                record
            })
            .collect()
    }
}

fn take_integer(block: &mut RecordBlock, column: &'static str, row: usize) -> Result<i64, ExtractError> {
    let raw = block.shift_remove(column);
    let parsed = raw.as_deref().and_then(|v| v.trim().parse::<i64>().ok());
    parsed.ok_or(ExtractError::NumericConversion {
            column,
            row,
            value: raw,
        })
}

fn format_optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn reduce(tree: &MarkupTree) -> Result<Option<HoldingsTable>, ExtractError> {
    HoldingsTable::from_blocks(collect_blocks(tree))
}
