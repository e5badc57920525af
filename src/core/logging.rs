use anyhow::Result;
use chrono::Local;
use log::{Level, LevelFilter};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// A named log destination. Components receive their sinks through
/// [`Diagnostics`] instead of looking loggers up by name.
pub trait LogSink: Send + Sync {
    fn name(&self) -> &str;
    fn record(&self, level: Level, message: &str);
}

/// Forwards records to the `log` facade under a fixed target, so whatever
/// logger the binary installed (env_logger) decides where they go.
pub struct TargetSink {
    target: String,
}

impl TargetSink {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
        }
    }
}

impl LogSink for TargetSink {
    fn name(&self) -> &str {
        &self.target
    }

    fn record(&self, level: Level, message: &str) {
        log::log!(target: self.target.as_str(), level, "{}", message);
    }
}

/// Appends `timestamp - LEVEL - message` lines to a daily rolling file
/// `{dir}/{name}.{YYYY-MM-DD}.log` (UTC date), dropping records below `threshold`.
pub struct FileSink {
    name: String,
    dir: PathBuf,
    threshold: LevelFilter,
    appender: Mutex<RollingFileAppender>,
}

impl FileSink {
    pub fn daily(dir: &Path, name: &str, threshold: LevelFilter) -> Result<Self> {
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(name)
            .filename_suffix("log")
            .build(dir)?;
        Ok(Self {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            threshold,
            appender: Mutex::new(appender),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl LogSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn record(&self, level: Level, message: &str) {
        if level > self.threshold {
            return;
        }
        let line = format!(
            "{} - {} - {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level,
            message
        );
        match self.appender.lock() {
            Ok(mut appender) => {
                if let Err(e) = appender
                    .write_all(line.as_bytes())
                    .and_then(|_| appender.flush())
                {
                    log::error!("Failed to write to {} log in {:?}: {}", self.name, self.dir, e);
                }
            }
            Err(_) => log::error!("{} log in {:?}: lock poisoned", self.name, self.dir),
        }
    }
}

/// Keeps every record in memory; handy for inspecting what a run reported.
#[derive(Default)]
pub struct MemorySink {
    name: String,
    records: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<(Level, String)> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, level: Level) -> usize {
        self.records().iter().filter(|(l, _)| *l == level).count()
    }
}

impl LogSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn record(&self, level: Level, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push((level, message.to_string()));
        }
    }
}

/// The list of destinations a component reports to. Cloning is cheap.
#[derive(Clone, Default)]
pub struct Diagnostics {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl Diagnostics {
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self { sinks }
    }

    /// Out/err log files for a run plus a console target, e.g. `parseOut.2021-11-10.log`
    /// (debug and above) and `parseErr.2021-11-10.log` (errors only).
    pub fn for_run(log_dir: &Path, run: &str) -> Result<Self> {
        let out = FileSink::daily(log_dir, &format!("{}Out", run), LevelFilter::Debug)?;
        let err = FileSink::daily(log_dir, &format!("{}Err", run), LevelFilter::Error)?;
        Ok(Self::new(vec![
            Arc::new(TargetSink::new(&format!("edgar_holdings::{}", run))),
            Arc::new(out),
            Arc::new(err),
        ]))
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub fn log(&self, level: Level, message: &str) {
        for sink in &self.sinks {
            sink.record(level, message);
        }
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }
}
