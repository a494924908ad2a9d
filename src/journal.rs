use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::Local;
use csv::WriterBuilder;
use serde::Serialize;

use crate::app_dirs::AppDirs;
use crate::session::{FinalReport, TestSettings};

/// One completed session, as logged to the CSV journal.
#[derive(Debug, Serialize)]
pub struct JournalEntry {
    pub date: String,
    pub duration_secs: u64,
    pub mode: String,
    pub competitive: bool,
    pub wpm: u32,
    pub accuracy: f64,
    pub consistency: Option<f64>,
    pub characters_typed: usize,
    pub total_keypresses: usize,
}

impl JournalEntry {
    pub fn from_report(report: &FinalReport, settings: TestSettings) -> Self {
        Self {
            date: Local::now().format("%c").to_string(),
            duration_secs: settings.duration.secs(),
            mode: settings.mode.to_string(),
            competitive: settings.competitive,
            wpm: report.wpm,
            accuracy: report.accuracy,
            consistency: report.consistency,
            characters_typed: report.characters_typed,
            total_keypresses: report.total_keypresses,
        }
    }
}

/// Append-only CSV log of finished sessions under the config dir.
#[derive(Debug, Clone)]
pub struct SessionJournal {
    path: PathBuf,
}

impl SessionJournal {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::journal_path()
            .unwrap_or_else(|| PathBuf::from("typometer_sessions.csv"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn append(&self, entry: &JournalEntry) -> csv::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Emit the header only when starting a fresh file.
        let needs_header = !self.path.exists();

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;

        let mut writer = WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(entry)?;
        writer.flush()?;
        Ok(())
    }
}
