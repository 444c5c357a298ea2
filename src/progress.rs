// progress.rs

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use prettytable::{format, row, Table};
use std::fmt;
use std::time::Duration;

/// Stage of the pipeline, shown as a prefix on every log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    Global,
    Loading,
    QualityControl,
    Frequency,
    Association,
    LinkageDisequilibrium,
    TopHits,
    Writing,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ProcessingStage::Global => "global",
            ProcessingStage::Loading => "load",
            ProcessingStage::QualityControl => "qc",
            ProcessingStage::Frequency => "freq",
            ProcessingStage::Association => "assoc",
            ProcessingStage::LinkageDisequilibrium => "ld",
            ProcessingStage::TopHits => "top-hits",
            ProcessingStage::Writing => "write",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

static CURRENT_STAGE: Lazy<Mutex<ProcessingStage>> =
    Lazy::new(|| Mutex::new(ProcessingStage::Global));

pub fn set_stage(stage: ProcessingStage) {
    *CURRENT_STAGE.lock() = stage;
}

pub fn current_stage() -> ProcessingStage {
    *CURRENT_STAGE.lock()
}

/// Logs through the `log` facade, tagged with the current stage.
pub fn log(level: LogLevel, message: &str) {
    let stage = current_stage();
    match level {
        LogLevel::Debug => log::debug!("[{}] {}", stage, message),
        LogLevel::Info => log::info!("[{}] {}", stage, message),
        LogLevel::Warning => log::warn!("[{}] {}", stage, message),
        LogLevel::Error => log::error!("[{}] {}", stage, message),
    }
}

pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Progress bar over `len` units (variants or variant pairs).
pub fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} {msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// A titled block of key/value statistics.
#[derive(Debug, Clone)]
pub struct StatusBox {
    pub title: String,
    pub stats: Vec<(String, String)>,
}

pub fn render_status_box(status: &StatusBox) -> String {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    for (key, value) in &status.stats {
        table.add_row(row![key, r->value]);
    }
    format!("{}\n{}", status.title.bold().cyan(), table)
}

/// Prints a status box to stderr and mirrors its lines to the log.
pub fn display_status_box(status: StatusBox) {
    eprintln!("{}", render_status_box(&status));
    for (key, value) in &status.stats {
        log(LogLevel::Debug, &format!("{}: {} = {}", status.title, key, value));
    }
}
