use anyhow::{anyhow, Result};
use chrono::{Datelike, NaiveDate};
use csv::WriterBuilder;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::Path;
use url::Url;

use crate::core::{Diagnostics, HoldingsConfig};
use crate::utils::http::fetch_with_retries;

pub const EDGAR_ARCHIVES_URL: &str = "https://www.sec.gov/Archives/";

/// Character columns of a `form.*.idx` listing line.
const SEGMENTS: [(usize, usize); 5] = [(0, 12), (12, 74), (74, 86), (86, 98), (98, 142)];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub form: String,
    pub company: String,
    #[serde(rename = "CIK")]
    pub cik: String,
    pub date: String,
    pub url: String,
    pub fid: String,
}

impl IndexEntry {
    pub fn filing_url(&self) -> Result<Url> {
        Ok(Url::parse(EDGAR_ARCHIVES_URL)?.join(&self.url)?)
    }

    pub fn filing_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y%m%d")
            .or_else(|_| NaiveDate::parse_from_str(&self.date, "%Y-%m-%d"))
            .ok()
    }
}

pub fn quarter(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

pub fn daily_index_url(date: NaiveDate) -> Result<Url> {
    let path = format!(
        "edgar/daily-index/{}/QTR{}/form.{}.idx",
        date.year(),
        quarter(date),
        day_key(date)
    );
    Ok(Url::parse(EDGAR_ARCHIVES_URL)?.join(&path)?)
}

fn segment(line: &str, start: usize, end: usize) -> String {
    line.chars()
        .skip(start)
        .take(end - start)
        .collect::<String>()
        .trim()
        .to_string()
}

fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parses a daily form index, keeping entries whose form type starts with
/// `form_prefix`.
pub fn parse_daily_index(text: &str, form_prefix: &str) -> Vec<IndexEntry> {
    text.lines()
        .skip_while(|line| !line.starts_with("Form"))
        .skip(1)
        .filter(|line| line.starts_with(form_prefix))
        .map(|line| {
            let fields: Vec<String> = SEGMENTS
                .iter()
                .map(|&(start, end)| segment(line, start, end))
                .collect();
            IndexEntry {
                fid: file_stem(&fields[4]),
                form: fields[0].clone(),
                company: fields[1].clone(),
                cik: fields[2].clone(),
                date: fields[3].clone(),
                url: fields[4].clone(),
            }
        })
        .collect()
}

pub fn write_daily_index(path: &Path, entries: &[IndexEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_writer(File::create(path)?);
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_daily_index(path: &Path) -> Result<Vec<IndexEntry>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| anyhow!("Failed to open daily index {:?}: {}", path, e))?;
    let mut entries = Vec::new();
    for record in reader.deserialize() {
        entries.push(record?);
    }
    Ok(entries)
}

/// Downloads the form index for `date`, keeps the configured form types and
/// stores them next to the day directory.
pub async fn fetch_daily_index(
    client: &Client,
    config: &HoldingsConfig,
    date: NaiveDate,
    diagnostics: &Diagnostics,
) -> Result<Vec<IndexEntry>> {
    let url = daily_index_url(date)?;
    diagnostics.info(&format!(
        "fetching daily index {} (form filter {})",
        url, config.form_filter
    ));

    let text = fetch_with_retries(
        client,
        &url,
        &config.user_agent,
        config.max_tries,
        config.request_delay,
    )
    .await
    .map_err(|e| {
        diagnostics.error(&format!("daily index {} unavailable: {}", url, e));
        e
    })?;

    let entries = parse_daily_index(&text, &config.form_filter);
    if entries.is_empty() {
        diagnostics.warn(&format!("no {} forms listed in {}", config.form_filter, url));
        return Ok(entries);
    }

    let path = config.daily_index_csv(&day_key(date));
    write_daily_index(&path, &entries)?;
    diagnostics.info(&format!("{} entries saved to {:?}", entries.len(), path));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn index_line(form: &str, company: &str, cik: &str, date: &str, path: &str) -> String {
        format!("{:<12}{:<62}{:<12}{:<12}{}", form, company, cik, date, path)
    }

    fn sample_index() -> String {
        [
            "Description:           Daily Index of EDGAR Dissemination Feed by Form Type".to_string(),
            "Last Data Received:    Nov 10, 2021".to_string(),
            String::new(),
            "Form Type   Company Name                                                  CIK         Date Filed  File Name".to_string(),
            "-".repeat(140),
            index_line("10-Q", "ACME CORP", "1111111", "20211110", "edgar/data/1111111/0001111111-21-000007.txt"),
            index_line("13F-HR", "HARBOR & PINE CAPITAL MANAGEMENT, LLC", "1234567", "20211110", "edgar/data/1234567/0001234567-21-000042.txt"),
            index_line("13F-NT", "QUIET FUND LP", "7654321", "20211110", "edgar/data/7654321/0007654321-21-000003.txt"),
            index_line("SC 13G", "SOMEONE ELSE", "5555555", "20211110", "edgar/data/5555555/0005555555-21-000001.txt"),
        ]
        .join("\n")
    }

    #[test]
    fn test_daily_index_url() {
        let date = NaiveDate::from_ymd_opt(2021, 11, 10).unwrap();
        assert_eq!(
            daily_index_url(date).unwrap().as_str(),
            "https://www.sec.gov/Archives/edgar/daily-index/2021/QTR4/form.20211110.idx"
        );
        assert_eq!(quarter(NaiveDate::from_ymd_opt(2021, 3, 31).unwrap()), 1);
        assert_eq!(quarter(NaiveDate::from_ymd_opt(2021, 4, 1).unwrap()), 2);
    }

    #[test]
    fn test_parse_daily_index_filters_by_prefix() {
        let entries = parse_daily_index(&sample_index(), "13");
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.form, "13F-HR");
        assert_eq!(first.company, "HARBOR & PINE CAPITAL MANAGEMENT, LLC");
        assert_eq!(first.cik, "1234567");
        assert_eq!(first.date, "20211110");
        assert_eq!(first.url, "edgar/data/1234567/0001234567-21-000042.txt");
        assert_eq!(first.fid, "0001234567-21-000042");
        assert_eq!(
            first.filing_url().unwrap().as_str(),
            "https://www.sec.gov/Archives/edgar/data/1234567/0001234567-21-000042.txt"
        );
        assert_eq!(first.filing_date(), NaiveDate::from_ymd_opt(2021, 11, 10));
    }

    #[test]
    fn test_parse_daily_index_without_header() {
        assert!(parse_daily_index("13F-HR  nothing here", "13").is_empty());
    }

    #[test]
    fn test_daily_index_csv_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dailyForms_13_20211110.csv");
        let entries = parse_daily_index(&sample_index(), "13");

        write_daily_index(&path, &entries).unwrap();
        let header = fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("form,company,CIK,date,url,fid\n"));
        assert_eq!(read_daily_index(&path).unwrap(), entries);
    }
}
