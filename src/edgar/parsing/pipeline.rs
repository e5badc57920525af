use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use url::form_urlencoded::byte_serialize;

use super::error::ExtractOutcome;
use super::metadata::FilingMetadata;
use super::repair::repair;
use super::table::reduce;
use super::tree::parse_markup;
use crate::core::Diagnostics;

/// Runs repair, parse, metadata and reduction for one filing at a time.
/// Holds no per-document state, so a single instance can be shared by workers.
#[derive(Clone)]
pub struct HoldingsExtractor {
    diagnostics: Diagnostics,
    diagnostic_dir: PathBuf,
}

impl HoldingsExtractor {
    pub fn new(diagnostics: Diagnostics, diagnostic_dir: impl Into<PathBuf>) -> Self {
        Self {
            diagnostics,
            diagnostic_dir: diagnostic_dir.into(),
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn extract(&self, text: &str, document_id: &str, filing_date: NaiveDate) -> ExtractOutcome {
        self.diagnostics
            .debug(&format!("{}: extracting holdings ({} bytes)", document_id, text.len()));

        let repaired = match repair(text, &self.diagnostics) {
            Ok(repaired) => repaired,
            Err(e) => {
                self.diagnostics.error(&format!("{}: {}", document_id, e));
                return ExtractOutcome::Failed(e);
            }
        };

        let tree = match parse_markup(&repaired) {
            Ok(tree) => tree,
            Err(e) => {
                self.diagnostics.error(&format!("{}: {}", document_id, e));
                self.dump_unparsed(document_id, &repaired);
                return ExtractOutcome::Failed(e);
            }
        };

        let metadata = FilingMetadata::from_repaired(&repaired, filing_date, &self.diagnostics);

        match reduce(&tree) {
            Ok(Some(table)) => {
                self.diagnostics.debug(&format!(
                    "{}: {} holdings, total value {}",
                    document_id,
                    table.len(),
                    table.total_value()
                ));
                ExtractOutcome::Table(table.with_metadata(metadata))
            }
            Ok(None) => {
                self.diagnostics
                    .warn(&format!("{}: empty holdings table", document_id));
                ExtractOutcome::Empty
            }
            Err(e) => {
                self.diagnostics.error(&format!("{}: {}", document_id, e));
                ExtractOutcome::Failed(e)
            }
        }
    }

    pub fn unparsed_path(&self, document_id: &str) -> PathBuf {
        unparsed_path(&self.diagnostic_dir, document_id)
    }

    fn dump_unparsed(&self, document_id: &str, repaired: &str) {
        let path = self.unparsed_path(document_id);
        let written = fs::create_dir_all(&self.diagnostic_dir).and_then(|_| fs::write(&path, repaired));
        match written {
            Ok(()) => self
                .diagnostics
                .info(&format!("{}: unparsed markup saved to {:?}", document_id, path)),
            Err(e) => self.diagnostics.error(&format!(
                "{}: could not save unparsed markup to {:?}: {}",
                document_id, path, e
            )),
        }
    }
}

/// Dump file for a document. The stem is form-urlencoded, which keeps ids
/// built by `filing_file_name` readable and never maps two ids to one file.
fn unparsed_path(dir: &Path, document_id: &str) -> PathBuf {
    let stem = Path::new(document_id)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| document_id.to_string());
    let stem: String = byte_serialize(stem.as_bytes()).collect();
    dir.join(format!("{}.unparsed.txt", stem))
}
