use anyhow::Result;
use chrono::NaiveDate;
use futures::future::join_all;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::filing::filing_file_name;
use super::index::{day_key, fetch_daily_index, IndexEntry};
use crate::core::{Diagnostics, HoldingsConfig};
use crate::utils::http::fetch_and_save;
use crate::utils::{ProgressTracker, RateLimiter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStats {
    pub listed: usize,
    pub saved: usize,
    pub failed: usize,
}

impl DownloadStats {
    pub fn merge(self, other: DownloadStats) -> DownloadStats {
        DownloadStats {
            listed: self.listed + other.listed,
            saved: self.saved + other.saved,
            failed: self.failed + other.failed,
        }
    }
}

pub fn filing_path(day_dir: &Path, entry: &IndexEntry) -> PathBuf {
    day_dir.join(filing_file_name(&entry.company, &entry.cik, &entry.fid))
}

/// Fetches the day's index and every filing it lists into `{data_dir}/{YYYYMMDD}`.
pub async fn download_day(
    client: &Client,
    config: &HoldingsConfig,
    date: NaiveDate,
    diagnostics: &Diagnostics,
    show_progress: bool,
) -> Result<DownloadStats> {
    let entries = fetch_daily_index(client, config, date, diagnostics).await?;
    if entries.is_empty() {
        diagnostics.info(&format!("no forms for {}", day_key(date)));
        return Ok(DownloadStats::default());
    }

    let day_dir = config.day_dir(&day_key(date));
    tokio::fs::create_dir_all(&day_dir).await?;

    download_entries(client, config, entries, &day_dir, diagnostics, show_progress).await
}

/// Splits `entries` into batches; batches run concurrently, bounded by the
/// worker count, and each batch downloads its filings one after another.
pub async fn download_entries(
    client: &Client,
    config: &HoldingsConfig,
    entries: Vec<IndexEntry>,
    day_dir: &Path,
    diagnostics: &Diagnostics,
    show_progress: bool,
) -> Result<DownloadStats> {
    let limiter = Arc::new(RateLimiter::new(config.workers, config.request_delay));
    let progress = ProgressTracker::new(
        &format!("{:?}", day_dir),
        entries.len() as u64,
        show_progress,
    );
    let batch_size = config.download_batch_size.max(1);
    diagnostics.info(&format!(
        "downloading {} filings into {:?} in batches of {}",
        entries.len(),
        day_dir,
        batch_size
    ));

    let mut handles = Vec::new();
    for (batch_idx, batch) in entries.chunks(batch_size).enumerate() {
        let batch = batch.to_vec();
        let client = client.clone();
        let config = config.clone();
        let day_dir = day_dir.to_path_buf();
        let diagnostics = diagnostics.clone();
        let limiter = Arc::clone(&limiter);
        let progress = progress.clone();

        handles.push(tokio::spawn(async move {
            let _permit = match limiter.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    diagnostics.error(&format!("batch {} could not start: {}", batch_idx, e));
                    return DownloadStats {
                        listed: batch.len(),
                        saved: 0,
                        failed: batch.len(),
                    };
                }
            };
            download_batch(&client, &config, &batch, &day_dir, &limiter, &diagnostics, &progress)
                .await
        }));
    }

    let mut stats = DownloadStats::default();
    for result in join_all(handles).await {
        match result {
            Ok(batch_stats) => stats = stats.merge(batch_stats),
            Err(e) => diagnostics.error(&format!("download batch panicked: {}", e)),
        }
    }
    progress.finish();

    diagnostics.info(&format!(
        "{:?}: {} listed, {} saved, {} failed",
        day_dir, stats.listed, stats.saved, stats.failed
    ));
    Ok(stats)
}

async fn download_batch(
    client: &Client,
    config: &HoldingsConfig,
    batch: &[IndexEntry],
    day_dir: &Path,
    limiter: &RateLimiter,
    diagnostics: &Diagnostics,
    progress: &ProgressTracker,
) -> DownloadStats {
    let mut stats = DownloadStats {
        listed: batch.len(),
        ..DownloadStats::default()
    };

    for entry in batch {
        limiter.pace().await;
        match download_filing(client, config, entry, day_dir).await {
            Ok(path) => {
                stats.saved += 1;
                diagnostics.debug(&format!("saved {:?}", path));
            }
            Err(e) => {
                stats.failed += 1;
                diagnostics.error(&format!(
                    "{} ({}, {}): {}",
                    entry.company, entry.cik, entry.fid, e
                ));
            }
        }
        progress.increment(1);
    }
    stats
}

async fn download_filing(
    client: &Client,
    config: &HoldingsConfig,
    entry: &IndexEntry,
    day_dir: &Path,
) -> Result<PathBuf> {
    let url = entry.filing_url()?;
    let path = filing_path(day_dir, entry);
    fetch_and_save(
        client,
        &url,
        &path,
        &config.user_agent,
        config.max_tries,
        config.request_delay,
    )
    .await?;
    Ok(path)
}

/// Calendar days ending at `end`, newest first, skipping weekends when no
/// index is published.
pub fn business_days(end: NaiveDate, days: u32) -> Vec<NaiveDate> {
    use chrono::{Datelike, Days, Weekday};
    (0..u64::from(days))
        .filter_map(|offset| end.checked_sub_days(Days::new(offset)))
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}
