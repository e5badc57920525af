use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate};
use colored::*;
use edgar_holdings::{
    core::{Diagnostics, HoldingsConfig},
    edgar::{
        business_days, download_day, filing, holdings, list_days, parse_days, DownloadStats,
    },
    utils::http,
    HoldingsExtractor,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "holdings-cli", about = "Download and parse 13F holdings filings from SEC EDGAR")]
enum Command {
    /// Download the daily index and filings for recent business days
    Download {
        /// Number of calendar days to walk back from --end
        #[structopt(long, default_value = "3")]
        days: u32,
        /// Last day to download (YYYYMMDD), defaults to today
        #[structopt(long, parse(try_from_str = parse_day_arg))]
        end: Option<NaiveDate>,
    },
    /// Extract holdings tables from downloaded day directories, newest first
    Parse {
        /// Oldest day to parse (YYYYMMDD)
        #[structopt(long, parse(try_from_str = parse_day_arg))]
        since: Option<NaiveDate>,
    },
    /// Extract the holdings table of a single filing and print it as JSON
    Extract {
        #[structopt(parse(from_os_str))]
        input: PathBuf,
        /// Filing date used when the acceptance timestamp is missing (YYYYMMDD)
        #[structopt(long, parse(try_from_str = parse_day_arg))]
        date: Option<NaiveDate>,
    },
}

fn parse_day_arg(raw: &str) -> Result<NaiveDate> {
    holdings::parse_day_key(raw)
}

async fn run_download(
    config: &HoldingsConfig,
    days: u32,
    end: Option<NaiveDate>,
    show_progress: bool,
) -> Result<()> {
    let diagnostics = Diagnostics::for_run(&config.log_dir, "download")?;
    let client = http::build_client(config)?;
    let end = end.unwrap_or_else(|| Local::now().date_naive());

    let mut total = DownloadStats::default();
    for date in business_days(end, days) {
        println!("{} {}", "Downloading".green().bold(), date);
        match download_day(&client, config, date, &diagnostics, show_progress).await {
            Ok(stats) => {
                println!(
                    "  {} listed, {} saved, {}",
                    stats.listed,
                    stats.saved,
                    format!("{} failed", stats.failed).color(if stats.failed > 0 { "red" } else { "white" })
                );
                total = total.merge(stats);
            }
            Err(e) => {
                diagnostics.error(&format!("{}: {}", date, e));
                println!("  {}", format!("skipped: {}", e).yellow());
            }
        }
    }

    println!(
        "{} {} saved of {} listed",
        "Done.".green().bold(),
        total.saved,
        total.listed
    );
    Ok(())
}

fn run_parse(config: &HoldingsConfig, since: Option<NaiveDate>, show_progress: bool) -> Result<()> {
    let diagnostics = Diagnostics::for_run(&config.log_dir, "parse")?;
    let since = since.map(|d| d.format(holdings::DAY_FORMAT).to_string());

    let days: Vec<String> = list_days(&config.data_dir)?
        .into_iter()
        .take_while(|day| since.as_ref().map_or(true, |since| day >= since))
        .collect();
    if days.is_empty() {
        println!("No day directories to parse in {:?}", config.data_dir);
        return Ok(());
    }

    let total = parse_days(config, &days, &diagnostics, show_progress, |day, result| {
        println!("{} {}", "Parsed".green().bold(), day);
        match result {
            Ok(stats) => println!(
                "  {} tables ({} rows), {} empty, {}",
                stats.tables,
                stats.rows,
                stats.empty,
                format!("{} failed", stats.failed).color(if stats.failed > 0 { "red" } else { "white" })
            ),
            Err(e) => println!("  {}", format!("skipped: {}", e).yellow()),
        }
    });

    println!(
        "{} {} tables from {} filings over {} days",
        "Done.".green().bold(),
        total.tables,
        total.files,
        days.len()
    );
    Ok(())
}

fn run_extract(config: &HoldingsConfig, input: PathBuf, date: Option<NaiveDate>) -> Result<()> {
    if !input.exists() {
        return Err(anyhow!("Input file does not exist: {:?}", input));
    }
    let diagnostics = Diagnostics::for_run(&config.log_dir, "extract")?;
    let extractor = HoldingsExtractor::new(diagnostics, config.diagnostic_dir.clone());

    let document_id = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let filing_date = date.unwrap_or_else(|| Local::now().date_naive());
    let text = filing::read_filing(&input)?;

    let outcome = extractor.extract(&text, &document_id, filing_date);
    if let Some(table) = outcome.table() {
        println!("{}", serde_json::to_string_pretty(&table.records())?);
        return Ok(());
    }
    if outcome.is_empty() {
        eprintln!("{}", "No holdings table found".yellow());
        return Ok(());
    }
    Err(anyhow!(
        "Could not extract holdings from {:?}, see {:?}",
        input,
        config.log_dir
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    log::debug!("Logger initialized");

    let command = Command::from_args();
    let config = HoldingsConfig::from_env()?;
    let show_progress = std::io::stderr().is_terminal();

    match command {
        Command::Download { days, end } => run_download(&config, days, end, show_progress).await,
        Command::Parse { since } => run_parse(&config, since, show_progress),
        Command::Extract { input, date } => run_extract(&config, input, date),
    }
}
