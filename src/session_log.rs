use chrono::Local;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::controller::{StageAttempt, StageOutcome};

/// Append one CSV row per finished session to `log.csv`. Best-effort: the
/// caller ignores the result so a full disk never disturbs a session.
pub fn append_session(result: Option<bool>, attempts: &[StageAttempt]) -> csv::Result<()> {
    let path = AppDirs::session_log_path()
        .unwrap_or_else(|| PathBuf::from("ringcheck_log.csv"));
    append_session_at(&path, result, attempts)
}

pub fn append_session_at(
    path: &Path,
    result: Option<bool>,
    attempts: &[StageAttempt],
) -> csv::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let needs_header = !path.exists();

    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut writer = csv::Writer::from_writer(file);

    if needs_header {
        writer.write_record(["date", "stages", "cleared", "outcome"])?;
    }

    let cleared = attempts
        .iter()
        .filter(|a| a.outcome == StageOutcome::Hit)
        .count();
    let outcome = match result {
        Some(true) => "success",
        Some(false) => "failure",
        None => "abandoned",
    };

    writer.write_record([
        Local::now().format("%c").to_string(),
        attempts.len().to_string(),
        cleared.to_string(),
        outcome.to_string(),
    ])?;
    writer.flush()?;

    Ok(())
}
