use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "software@example.com";

#[derive(Clone, Debug)]
pub struct HoldingsConfig {
    pub user_agent: String,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub diagnostic_dir: PathBuf,
    /// Prefix the daily index form type must start with, e.g. `13` for 13F filings.
    pub form_filter: String,
    pub download_batch_size: usize,
    pub parse_batch_size: usize,
    pub request_delay: Duration,
    pub request_timeout: Duration,
    pub max_tries: usize,
    pub workers: usize,
}

impl Default for HoldingsConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            diagnostic_dir: data_dir.join("unparsed"),
            data_dir,
            log_dir: PathBuf::from("logs"),
            form_filter: "13".to_string(),
            download_batch_size: 300,
            parse_batch_size: 20,
            request_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(10),
            max_tries: 4,
            workers: default_workers(),
        }
    }
}

impl HoldingsConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let user_agent =
            std::env::var("USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());

        let data_dir = std::env::var("HOLDINGS_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let log_dir = std::env::var("HOLDINGS_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_dir);

        let diagnostic_dir = std::env::var("HOLDINGS_DIAGNOSTIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("unparsed"));

        let form_filter = std::env::var("FORM_FILTER").unwrap_or(defaults.form_filter);

        Ok(Self {
            user_agent,
            data_dir,
            log_dir,
            diagnostic_dir,
            form_filter,
            download_batch_size: env_number("DOWNLOAD_BATCH_SIZE", defaults.download_batch_size)?,
            parse_batch_size: env_number("PARSE_BATCH_SIZE", defaults.parse_batch_size)?,
            request_delay: Duration::from_millis(env_number(
                "REQUEST_DELAY_MS",
                defaults.request_delay.as_millis() as u64,
            )?),
            request_timeout: Duration::from_secs(env_number(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            max_tries: env_number("MAX_TRIES", defaults.max_tries)?,
            workers: env_number("HOLDINGS_WORKERS", defaults.workers)?,
        })
    }

    pub fn day_dir(&self, day: &str) -> PathBuf {
        self.data_dir.join(day)
    }

    pub fn daily_index_csv(&self, day: &str) -> PathBuf {
        self.data_dir
            .join(format!("dailyForms_{}_{}.csv", self.form_filter, day))
    }
}

fn env_number<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{} must be a number, got {:?}: {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_index_csv_path() {
        let config = HoldingsConfig {
            data_dir: PathBuf::from("/tmp/holdings"),
            ..HoldingsConfig::default()
        };
        assert_eq!(
            config.daily_index_csv("20211110"),
            PathBuf::from("/tmp/holdings/dailyForms_13_20211110.csv")
        );
        assert_eq!(
            config.day_dir("20211110"),
            PathBuf::from("/tmp/holdings/20211110")
        );
    }

    #[test]
    fn test_env_number_rejects_garbage() {
        std::env::set_var("HOLDINGS_TEST_BATCH", "twenty");
        assert!(env_number::<usize>("HOLDINGS_TEST_BATCH", 20).is_err());
        std::env::set_var("HOLDINGS_TEST_BATCH", " 40 ");
        assert_eq!(env_number::<usize>("HOLDINGS_TEST_BATCH", 20).unwrap(), 40);
        std::env::remove_var("HOLDINGS_TEST_BATCH");
        assert_eq!(env_number::<usize>("HOLDINGS_TEST_BATCH", 20).unwrap(), 20);
    }
}
