use chrono::{DateTime, Local};
use itertools::Itertools;
use rusqlite::{params, Connection, Result};
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::controller::StageAttempt;

/// One stored stage attempt.
#[derive(Debug, Clone)]
pub struct AttemptRow {
    pub timestamp: DateTime<Local>,
    pub stage_index: usize,
    pub difficulty: String,
    pub arc_width_deg: f64,
    pub speed_multiplier: f64,
    pub assigned_key: String,
    pub outcome: String,
    pub angle_deg: Option<f64>,
    pub error_deg: Option<f64>,
    pub reaction_ms: Option<u64>,
}

impl AttemptRow {
    pub fn from_attempt(attempt: &StageAttempt, timestamp: DateTime<Local>) -> AttemptRow {
        AttemptRow {
            timestamp,
            stage_index: attempt.index,
            difficulty: attempt.label.to_string(),
            arc_width_deg: attempt.arc_width_deg,
            speed_multiplier: attempt.speed_multiplier,
            assigned_key: attempt.assigned_key.clone(),
            outcome: attempt.outcome.to_string(),
            angle_deg: attempt.angle_deg,
            error_deg: attempt.error_deg,
            reaction_ms: attempt.reaction_ms,
        }
    }
}

/// Aggregated view of all attempts at one difficulty label.
#[derive(Debug, Clone, PartialEq)]
pub struct DifficultySummary {
    pub difficulty: String,
    pub attempts: usize,
    pub hits: usize,
    /// Percentage of attempts that were hits (0-100).
    pub hit_rate: f64,
    /// Mean absolute angular error of evaluated presses, degrees.
    pub avg_abs_error_deg: Option<f64>,
    /// Spread (population standard deviation) of the absolute errors.
    pub error_spread_deg: Option<f64>,
    pub avg_reaction_ms: Option<f64>,
}

/// Database manager for stage attempt history
#[derive(Debug)]
pub struct AttemptDb {
    conn: Connection,
}

impl AttemptDb {
    /// Open the default per-user database, creating schema as needed.
    pub fn new() -> Result<Self> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("ringcheck_attempts.db"));
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }
        Self::open(db_path)
    }

    /// Open a database at an explicit path (tests point this at a tempdir).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS stage_attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                stage_index INTEGER NOT NULL,
                difficulty TEXT NOT NULL,
                arc_width_deg REAL NOT NULL,
                speed_multiplier REAL NOT NULL,
                assigned_key TEXT NOT NULL,
                outcome TEXT NOT NULL,
                angle_deg REAL,
                error_deg REAL,
                reaction_ms INTEGER,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_stage_attempts_difficulty ON stage_attempts(difficulty)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_stage_attempts_timestamp ON stage_attempts(timestamp)",
            [],
        )?;

        Ok(AttemptDb { conn })
    }

    /// Record a single attempt row
    pub fn record_attempt(&self, row: &AttemptRow) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO stage_attempts
            (timestamp, stage_index, difficulty, arc_width_deg, speed_multiplier,
             assigned_key, outcome, angle_deg, error_deg, reaction_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                row.timestamp.to_rfc3339(),
                row.stage_index as i64,
                row.difficulty,
                row.arc_width_deg,
                row.speed_multiplier,
                row.assigned_key,
                row.outcome,
                row.angle_deg,
                row.error_deg,
                row.reaction_ms.map(|ms| ms as i64),
            ],
        )?;

        Ok(())
    }

    /// Record every attempt of a finished session in one transaction
    pub fn record_session(&mut self, attempts: &[StageAttempt]) -> Result<()> {
        let now = Local::now();
        let tx = self.conn.transaction()?;
        for attempt in attempts {
            let row = AttemptRow::from_attempt(attempt, now);
            tx.execute(
                r#"
                INSERT INTO stage_attempts
                (timestamp, stage_index, difficulty, arc_width_deg, speed_multiplier,
                 assigned_key, outcome, angle_deg, error_deg, reaction_ms)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    row.timestamp.to_rfc3339(),
                    row.stage_index as i64,
                    row.difficulty,
                    row.arc_width_deg,
                    row.speed_multiplier,
                    row.assigned_key,
                    row.outcome,
                    row.angle_deg,
                    row.error_deg,
                    row.reaction_ms.map(|ms| ms as i64),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Most recent attempts, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<AttemptRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT timestamp, stage_index, difficulty, arc_width_deg, speed_multiplier,
                   assigned_key, outcome, angle_deg, error_deg, reaction_ms
            FROM stage_attempts
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let timestamp_str: String = row.get(0)?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        0,
                        "timestamp".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?
                .with_timezone(&Local);

            Ok(AttemptRow {
                timestamp,
                stage_index: row.get::<_, i64>(1)? as usize,
                difficulty: row.get(2)?,
                arc_width_deg: row.get(3)?,
                speed_multiplier: row.get(4)?,
                assigned_key: row.get(5)?,
                outcome: row.get(6)?,
                angle_deg: row.get(7)?,
                error_deg: row.get(8)?,
                reaction_ms: row.get::<_, Option<i64>>(9)?.map(|ms| ms as u64),
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Aggregate attempts per difficulty label, sorted by attempt count
    pub fn summary_by_difficulty(&self) -> Result<Vec<DifficultySummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT difficulty, outcome, error_deg, reaction_ms FROM stage_attempts",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, Option<i64>>(3)?,
            ))
        })?;

        let mut raw = Vec::new();
        for row in rows {
            raw.push(row?);
        }

        let grouped = raw
            .into_iter()
            .map(|(difficulty, outcome, error, reaction)| (difficulty, (outcome, error, reaction)))
            .into_group_map();

        let summaries = grouped
            .into_iter()
            .map(|(difficulty, entries)| {
                let attempts = entries.len();
                let hits = entries.iter().filter(|(o, _, _)| o == "hit").count();
                let errors: Vec<f64> = entries
                    .iter()
                    .filter_map(|(_, e, _)| e.map(f64::abs))
                    .collect();
                let reactions: Vec<f64> = entries
                    .iter()
                    .filter_map(|(_, _, r)| r.map(|ms| ms as f64))
                    .collect();

                DifficultySummary {
                    difficulty,
                    attempts,
                    hits,
                    hit_rate: hits as f64 / attempts as f64 * 100.0,
                    avg_abs_error_deg: mean(&errors),
                    error_spread_deg: spread(&errors),
                    avg_reaction_ms: mean(&reactions),
                }
            })
            .sorted_by(|a, b| b.attempts.cmp(&a.attempts))
            .collect();

        Ok(summaries)
    }

    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM stage_attempts", [])?;
        Ok(())
    }

    pub fn database_exists() -> bool {
        AppDirs::db_path().map(|p| p.exists()).unwrap_or(false)
    }
}

/// Arithmetic mean; `None` on empty input
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Population standard deviation; `None` on empty input
pub fn spread(data: &[f64]) -> Option<f64> {
    let m = mean(data)?;
    let variance = data.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / data.len() as f64;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{StageAttempt, StageOutcome};
    use crate::difficulty::StageLabel;
    use tempfile::tempdir;

    fn attempt(index: usize, label: StageLabel, outcome: StageOutcome) -> StageAttempt {
        let evaluated = matches!(outcome, StageOutcome::Hit | StageOutcome::Miss);
        StageAttempt {
            index,
            label,
            zone_start_deg: 120.0,
            arc_width_deg: 50.0,
            speed_multiplier: 1.0,
            assigned_key: "e".to_string(),
            outcome,
            angle_deg: evaluated.then_some(140.0),
            error_deg: evaluated.then_some(-5.0),
            reaction_ms: evaluated.then_some(700),
        }
    }

    #[test]
    fn record_and_read_back_recent() {
        let dir = tempdir().unwrap();
        let mut db = AttemptDb::open(dir.path().join("attempts.db")).unwrap();

        db.record_session(&[
            attempt(0, StageLabel::Easy, StageOutcome::Hit),
            attempt(1, StageLabel::Hard, StageOutcome::Miss),
        ])
        .unwrap();

        let recent = db.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        // Newest first
        assert_eq!(recent[0].difficulty, "hard");
        assert_eq!(recent[0].outcome, "miss");
        assert_eq!(recent[1].difficulty, "easy");
        assert_eq!(recent[1].outcome, "hit");
        assert_eq!(recent[1].reaction_ms, Some(700));
    }

    #[test]
    fn timeout_rows_store_no_angle() {
        let dir = tempdir().unwrap();
        let mut db = AttemptDb::open(dir.path().join("attempts.db")).unwrap();

        db.record_session(&[attempt(0, StageLabel::Medium, StageOutcome::Timeout)])
            .unwrap();

        let recent = db.recent(1).unwrap();
        assert_eq!(recent[0].angle_deg, None);
        assert_eq!(recent[0].error_deg, None);
        assert_eq!(recent[0].reaction_ms, None);
    }

    #[test]
    fn summary_aggregates_per_difficulty() {
        let dir = tempdir().unwrap();
        let mut db = AttemptDb::open(dir.path().join("attempts.db")).unwrap();

        db.record_session(&[
            attempt(0, StageLabel::Easy, StageOutcome::Hit),
            attempt(0, StageLabel::Easy, StageOutcome::Hit),
            attempt(0, StageLabel::Easy, StageOutcome::Miss),
            attempt(0, StageLabel::Hard, StageOutcome::Timeout),
        ])
        .unwrap();

        let summary = db.summary_by_difficulty().unwrap();
        assert_eq!(summary.len(), 2);

        let easy = summary.iter().find(|s| s.difficulty == "easy").unwrap();
        assert_eq!(easy.attempts, 3);
        assert_eq!(easy.hits, 2);
        assert!((easy.hit_rate - 66.666).abs() < 0.01);
        assert_eq!(easy.avg_abs_error_deg, Some(5.0));

        let hard = summary.iter().find(|s| s.difficulty == "hard").unwrap();
        assert_eq!(hard.attempts, 1);
        assert_eq!(hard.hits, 0);
        assert_eq!(hard.avg_abs_error_deg, None);
    }

    #[test]
    fn clear_all_empties_the_table() {
        let dir = tempdir().unwrap();
        let mut db = AttemptDb::open(dir.path().join("attempts.db")).unwrap();
        db.record_session(&[attempt(0, StageLabel::Easy, StageOutcome::Hit)])
            .unwrap();
        db.clear_all().unwrap();
        assert!(db.recent(10).unwrap().is_empty());
    }

    #[test]
    fn mean_and_spread_helpers() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 4.0]), Some(3.0));
        assert_eq!(spread(&[]), None);
        assert_eq!(spread(&[5.0, 5.0, 5.0]), Some(0.0));
        assert!((spread(&[2.0, 4.0]).unwrap() - 1.0).abs() < 1e-12);
    }
}
