use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use std::sync::Arc;
use tempfile::tempdir;

use super::{ExtractError, ExtractOutcome, HoldingsExtractor};
use crate::core::{Diagnostics, MemorySink};

pub fn get_test_file_path(filename: &str) -> PathBuf {
    PathBuf::from("src/edgar/parsing/tests/data").join(filename)
}

pub fn read_test_file(filename: &str) -> String {
    fs::read_to_string(get_test_file_path(filename))
        .unwrap_or_else(|e| panic!("Failed to read test file {}: {}", filename, e))
}

fn filing_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 11, 10).unwrap()
}

#[test]
fn test_sample_filing_end_to_end() {
    let dir = tempdir().unwrap();
    let extractor = HoldingsExtractor::new(Diagnostics::default(), dir.path());
    let content = read_test_file("sample_13f.txt");

    let table = extractor
        .extract(&content, "sample_13f.txt", filing_date())
        .into_table()
        .expect("sample filing should produce a table");

    assert_eq!(table.len(), 3);
    let weights: Vec<f64> = table.rows().iter().map(|r| r.weight.unwrap()).collect();
    assert_eq!(weights, vec![0.5, 0.4, 0.1]);
    assert_eq!(table.rows()[1].fields["nameOfIssuer"], "JOHNSON and JOHNSON");
    assert_eq!(table.rows()[1].per_share, Some(160.0));
    assert_eq!(table.rows()[2].per_share, None);

    let metadata = table.metadata().unwrap();
    assert_eq!(metadata.state.as_deref(), Some("MA"));
    assert_eq!(metadata.city.as_deref(), Some("BOSTON"));
    assert_eq!(
        metadata.accepted_at,
        filing_date().and_hms_opt(16, 30, 12).unwrap()
    );

    let records = table.records();
    assert!(records.iter().all(|r| r["filingDt"] == "2021-11-10 16:30:12"));
    assert_eq!(records[0]["cusip"], "037833100");
    assert_eq!(records[0]["value"], "5000000");
}

#[test]
fn test_unbalanced_filing_is_dumped() {
    let dir = tempdir().unwrap();
    let sink = Arc::new(MemorySink::new("err"));
    let extractor = HoldingsExtractor::new(Diagnostics::new(vec![sink.clone()]), dir.path());
    let content = read_test_file("unbalanced_13f.txt");

    let outcome = extractor.extract(&content, "unbalanced_13f.txt", filing_date());
    assert!(matches!(
        outcome,
        ExtractOutcome::Failed(ExtractError::MalformedMarkup(_))
    ));

    let dumped = fs::read_to_string(extractor.unparsed_path("unbalanced_13f.txt")).unwrap();
    assert!(dumped.contains("<TYPE>13F-HR</TYPE>\n<PERIOD>"));
    assert_eq!(sink.count(log::Level::Error), 1);
}

#[test]
fn test_filing_without_entries_is_empty() {
    let dir = tempdir().unwrap();
    let sink = Arc::new(MemorySink::new("out"));
    let extractor = HoldingsExtractor::new(Diagnostics::new(vec![sink.clone()]), dir.path());
    let content = "<SEC-DOCUMENT>\n<DOCUMENT>\n<TYPE>13F-NT\n<SEQUENCE>1\n<TEXT>\n<XML>\n<edgarSubmission/>\n</XML>\n</TEXT>\n</DOCUMENT>\n</SEC-DOCUMENT>\n";

    let outcome = extractor.extract(content, "notice.txt", filing_date());
    assert!(outcome.is_empty());
    assert_eq!(sink.count(log::Level::Warn), 1);
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn test_conversion_failure_discards_table() {
    let dir = tempdir().unwrap();
    let sink = Arc::new(MemorySink::new("err"));
    let extractor = HoldingsExtractor::new(Diagnostics::new(vec![sink.clone()]), dir.path());
    let content = read_test_file("sample_13f.txt").replace("<value>4000</value>", "<value>4,000</value>");

    let outcome = extractor.extract(&content, "sample_13f.txt", filing_date());
    assert!(matches!(
        outcome,
        ExtractOutcome::Failed(ExtractError::NumericConversion { column: "value", row: 1, .. })
    ));
    assert!(outcome.table().is_none());

    let errors: Vec<String> = sink
        .records()
        .into_iter()
        .filter(|(level, _)| *level == log::Level::Error)
        .map(|(_, message)| message)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("sample_13f.txt: "));
    assert!(errors[0].contains("4,000"));
}
