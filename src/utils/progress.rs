use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Counts documents through a download or parse run. Hidden when not
/// attached to a terminal.
#[derive(Clone)]
pub struct ProgressTracker {
    progress_bar: Option<ProgressBar>,
    label: String,
}

impl ProgressTracker {
    pub fn new(label: &str, total: u64, visible: bool) -> Self {
        let progress_bar = visible.then(|| {
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb.enable_steady_tick(Duration::from_millis(100));
            pb.set_message(label.to_string());
            pb
        });
        Self {
            progress_bar,
            label: label.to_string(),
        }
    }

    pub fn increment(&self, delta: u64) {
        if let Some(pb) = &self.progress_bar {
            pb.inc(delta);
        }
    }

    pub fn finish(&self) {
        if let Some(pb) = &self.progress_bar {
            pb.finish_with_message(format!("Complete [{}]", self.label));
        }
    }
}
