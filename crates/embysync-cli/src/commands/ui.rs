use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

pub fn is_interactive() -> bool {
    std::io::stdout().is_terminal() && std::io::stderr().is_terminal()
}

/// Progress bar when attached to a terminal, structured log lines otherwise.
pub struct Progress {
    bar: Option<ProgressBar>,
}

impl Progress {
    pub fn bar(enabled: bool) -> Self {
        if !enabled || !is_interactive() {
            return Self { bar: None };
        }
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        Self { bar: Some(bar) }
    }

    pub fn spinner(enabled: bool, msg: &str) -> Self {
        if !enabled || !is_interactive() {
            tracing::info!(operation = "progress", message = msg, "Progress update");
            return Self { bar: None };
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        bar.set_message(msg.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    pub fn start_stage(&self, len: u64, msg: String) {
        match &self.bar {
            Some(bar) => {
                bar.set_length(len);
                bar.set_position(0);
                bar.set_message(msg);
            }
            None => tracing::info!(operation = "progress", total = len, message = %msg, "Progress update"),
        }
    }

    pub fn advance(&self, msg: String) {
        if let Some(bar) = &self.bar {
            bar.set_message(msg);
            bar.inc(1);
        }
    }

    pub fn finish(&self, msg: &str) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(msg.to_string());
        }
    }

    pub fn clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
