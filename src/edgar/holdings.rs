use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use csv::WriterBuilder;
use itertools::Itertools;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use super::filing::{parse_filing_file_name, read_filing, FILING_EXTENSION};
use super::index::read_daily_index;
use super::parsing::{ExtractOutcome, HoldingsExtractor, HoldingsTable};
use crate::core::{Diagnostics, HoldingsConfig};
use crate::utils::ProgressTracker;

pub const DAY_FORMAT: &str = "%Y%m%d";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub files: usize,
    pub tables: usize,
    pub empty: usize,
    pub failed: usize,
    pub rows: usize,
}

impl ParseStats {
    pub fn merge(self, other: ParseStats) -> ParseStats {
        ParseStats {
            files: self.files + other.files,
            tables: self.tables + other.tables,
            empty: self.empty + other.empty,
            failed: self.failed + other.failed,
            rows: self.rows + other.rows,
        }
    }

    fn table(rows: usize) -> Self {
        Self { files: 1, tables: 1, rows, ..Self::default() }
    }

    fn empty() -> Self {
        Self { files: 1, empty: 1, ..Self::default() }
    }

    fn failed() -> Self {
        Self { files: 1, failed: 1, ..Self::default() }
    }
}

pub fn parse_day_key(day: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(day, DAY_FORMAT)
        .map_err(|e| anyhow!("Invalid day directory {:?}: {}", day, e))
}

/// Day directories under `data_dir`, newest first.
pub fn list_days(data_dir: &Path) -> Result<Vec<String>> {
    let days = fs::read_dir(data_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| parse_day_key(name).is_ok())
        .sorted()
        .rev()
        .collect();
    Ok(days)
}

/// Downloaded filings in a day directory, sorted by name.
pub fn list_filings(day_dir: &Path) -> Result<Vec<PathBuf>> {
    let files = fs::read_dir(day_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(FILING_EXTENSION)
        })
        .sorted()
        .collect();
    Ok(files)
}

pub fn table_csv_path(filing: &Path) -> PathBuf {
    filing.with_extension("csv")
}

pub fn write_table_csv(path: &Path, table: &HoldingsTable) -> Result<()> {
    let header = table.header();
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(File::create(path)?);
    writer.write_record(&header)?;
    for record in table.records() {
        writer.write_record(
            header
                .iter()
                .map(|column| record.get(column).map(String::as_str).unwrap_or_default()),
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Filing dates by filing id, from the day's index CSV when one was saved.
fn filing_dates(config: &HoldingsConfig, day: &str, diagnostics: &Diagnostics) -> HashMap<String, NaiveDate> {
    let path = config.daily_index_csv(day);
    match read_daily_index(&path) {
        Ok(entries) => entries
            .into_iter()
            .filter_map(|entry| entry.filing_date().map(|date| (entry.fid, date)))
            .collect(),
        Err(e) => {
            diagnostics.warn(&format!(
                "{}: no daily index ({}), using the directory date",
                day, e
            ));
            HashMap::new()
        }
    }
}

fn parse_filing(
    extractor: &HoldingsExtractor,
    path: &Path,
    dates: &HashMap<String, NaiveDate>,
    fallback_date: NaiveDate,
) -> ParseStats {
    let diagnostics = extractor.diagnostics();
    let document_id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let filing_date = parse_filing_file_name(&document_id)
        .ok()
        .and_then(|(_, fid)| dates.get(&fid).copied())
        .unwrap_or(fallback_date);

    let text = match read_filing(path) {
        Ok(text) => text,
        Err(e) => {
            diagnostics.error(&format!("{}: unreadable: {}", document_id, e));
            return ParseStats::failed();
        }
    };

    match extractor.extract(&text, &document_id, filing_date) {
        ExtractOutcome::Table(table) => {
            let out = table_csv_path(path);
            match write_table_csv(&out, &table) {
                Ok(()) => {
                    diagnostics.debug(&format!("{}: {} rows written to {:?}", document_id, table.len(), out));
                    ParseStats::table(table.len())
                }
                Err(e) => {
                    diagnostics.error(&format!("{}: could not write {:?}: {}", document_id, out, e));
                    ParseStats::failed()
                }
            }
        }
        ExtractOutcome::Empty => ParseStats::empty(),
        ExtractOutcome::Failed(_) => ParseStats::failed(),
    }
}

/// Extracts holdings tables from every filing downloaded for `day`.
pub fn parse_day(
    config: &HoldingsConfig,
    day: &str,
    diagnostics: &Diagnostics,
    show_progress: bool,
) -> Result<ParseStats> {
    let fallback_date = parse_day_key(day)?;
    let day_dir = config.day_dir(day);
    let files = list_filings(&day_dir)?;
    if files.is_empty() {
        diagnostics.info(&format!("{}: nothing to parse in {:?}", day, day_dir));
        return Ok(ParseStats::default());
    }

    let dates = filing_dates(config, day, diagnostics);
    let extractor = HoldingsExtractor::new(diagnostics.clone(), config.diagnostic_dir.clone());
    let progress = ProgressTracker::new(day, files.len() as u64, show_progress);
    diagnostics.info(&format!(
        "{}: parsing {} filings on {} workers",
        day,
        files.len(),
        config.workers
    ));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.max(1))
        .build()?;
    let stats = pool.install(|| {
        files
            .par_chunks(config.parse_batch_size.max(1))
            .map(|chunk| {
                let stats = chunk.iter().fold(ParseStats::default(), |acc, path| {
                    acc.merge(parse_filing(&extractor, path, &dates, fallback_date))
                });
                progress.increment(chunk.len() as u64);
                stats
            })
            .reduce(ParseStats::default, ParseStats::merge)
    });
    progress.finish();

    diagnostics.info(&format!(
        "{}: {} tables ({} rows), {} empty, {} failed",
        day, stats.tables, stats.rows, stats.empty, stats.failed
    ));
    Ok(stats)
}

/// Parses `days` in order. A day that fails is logged and reported to
/// `on_day`; the remaining days still run.
pub fn parse_days<F>(
    config: &HoldingsConfig,
    days: &[String],
    diagnostics: &Diagnostics,
    show_progress: bool,
    mut on_day: F,
) -> ParseStats
where
    F: FnMut(&str, &Result<ParseStats>),
{
    days.iter().fold(ParseStats::default(), |total, day| {
        let result = parse_day(config, day, diagnostics, show_progress);
        if let Err(e) = &result {
            diagnostics.error(&format!("{}: day skipped: {}", day, e));
        }
        on_day(day, &result);
        match result {
            Ok(stats) => total.merge(stats),
            Err(_) => total,
        }
    })
}
