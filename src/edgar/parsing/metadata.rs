use chrono::{Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::collections::HashMap;

use crate::core::Diagnostics;

pub const ACCEPTANCE_DATETIME: &str = "ACCEPTANCE-DATETIME";
pub const STATE: &str = "STATE";
pub const CITY: &str = "CITY";

pub const METADATA_KEYS: [&str; 3] = [ACCEPTANCE_DATETIME, STATE, CITY];

pub const ACCEPTANCE_FORMAT: &str = "%Y%m%d%H%M%S";
const FILING_DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Finds `key: value` lines. Keys without a match are left out.
pub fn extract_fields(text: &str, keys: &[&str]) -> Result<HashMap<String, String>, regex::Error> {
    let mut fields = HashMap::new();
    for key in keys {
        let re = Regex::new(&format!(r"{}:([^\n]*)", regex::escape(key)))?;
        if let Some(value) = re.captures(text).and_then(|caps| caps.get(1)) {
            fields.insert(key.to_string(), value.as_str().trim().to_string());
        }
    }
    Ok(fields)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilingMetadata {
    pub filing_date: NaiveDate,
    /// Acceptance timestamp, or the filing date at midnight when unavailable.
    pub accepted_at: NaiveDateTime,
    pub state: Option<String>,
    pub city: Option<String>,
}

impl FilingMetadata {
    pub const COLUMNS: [&'static str; 6] = ["year", "month", "day", "filingDt", "state", "city"];

    pub fn new(filing_date: NaiveDate) -> Self {
        Self {
            filing_date,
            accepted_at: filing_date.and_time(chrono::NaiveTime::MIN),
            state: None,
            city: None,
        }
    }

    pub fn from_repaired(text: &str, filing_date: NaiveDate, diagnostics: &Diagnostics) -> Self {
        let mut metadata = Self::new(filing_date);

        let mut fields = match extract_fields(text, &METADATA_KEYS) {
            Ok(fields) => fields,
            Err(e) => {
                diagnostics.error(&format!("metadata pattern error: {}", e));
                return metadata;
            }
        };

        if let Some(raw) = fields.remove(ACCEPTANCE_DATETIME) {
            match NaiveDateTime::parse_from_str(&raw, ACCEPTANCE_FORMAT) {
                Ok(accepted_at) => metadata.accepted_at = accepted_at,
                Err(e) => diagnostics.warn(&format!(
                    "bad {} value {:?}, using filing date {}: {}",
                    ACCEPTANCE_DATETIME, raw, filing_date, e
                )),
            }
        }
        metadata.state = fields.remove(STATE);
        metadata.city = fields.remove(CITY);
        metadata
    }

    /// Values in [`COLUMNS`](Self::COLUMNS) order.
    pub fn values(&self) -> Vec<String> {
        vec![
            self.filing_date.year().to_string(),
            self.filing_date.month().to_string(),
            self.filing_date.day().to_string(),
            self.accepted_at.format(FILING_DT_FORMAT).to_string(),
            self.state.clone().unwrap_or_default(),
            self.city.clone().unwrap_or_default(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MemorySink;
    use std::sync::Arc;

    const HEADER: &str = "ACCEPTANCE-DATETIME: 20211110163012\nACCESSION NUMBER:\t\t0000950123-21-013859\n\tBUSINESS ADDRESS:\n\t\tSTREET 1:\t\t1 MAIN ST\n\t\tCITY:\t\t\tNEW YORK\n\t\tSTATE:\t\t\tNY\n\tMAIL ADDRESS:\n\t\tCITY:\t\t\tBOSTON\n";

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 11, 10).unwrap()
    }

    #[test]
    fn test_extract_fields_first_match_trimmed() {
        let fields = extract_fields(HEADER, &METADATA_KEYS).unwrap();
        assert_eq!(fields[ACCEPTANCE_DATETIME], "20211110163012");
        assert_eq!(fields[STATE], "NY");
        assert_eq!(fields[CITY], "NEW YORK");
    }

    #[test]
    fn test_missing_keys_are_absent() {
        let fields = extract_fields("CITY: PARIS\n", &METADATA_KEYS).unwrap();
        assert_eq!(fields.len(), 1);
        assert!(!fields.contains_key(ACCEPTANCE_DATETIME));
    }

    #[test]
    fn test_acceptance_timestamp_parsed() {
        let metadata = FilingMetadata::from_repaired(HEADER, date(), &Diagnostics::default());
        assert_eq!(
            metadata.accepted_at,
            NaiveDate::from_ymd_opt(2021, 11, 10)
                .unwrap()
                .and_hms_opt(16, 30, 12)
                .unwrap()
        );
        assert_eq!(metadata.state.as_deref(), Some("NY"));
        assert_eq!(
            metadata.values(),
            vec!["2021", "11", "10", "2021-11-10 16:30:12", "NY", "NEW YORK"]
        );
    }

    #[test]
    fn test_missing_acceptance_falls_back_to_filing_date() {
        let metadata = FilingMetadata::from_repaired("STATE: CA\n", date(), &Diagnostics::default());
        assert_eq!(metadata.accepted_at, date().and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(metadata.values()[3], "2021-11-10 00:00:00");
    }

    #[test]
    fn test_bad_acceptance_value_is_reported() {
        let sink = Arc::new(MemorySink::new("test"));
        let diagnostics = Diagnostics::new(vec![sink.clone()]);
        let metadata =
            FilingMetadata::from_repaired("ACCEPTANCE-DATETIME: 2021-11-10\n", date(), &diagnostics);

        assert_eq!(metadata.accepted_at, date().and_hms_opt(0, 0, 0).unwrap());
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, log::Level::Warn);
        assert!(records[0].1.contains("\"2021-11-10\""));
    }
}
