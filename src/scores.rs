use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;

/// Rows shown on the leaderboard view.
pub const LEADERBOARD_SIZE: usize = 25;

/// One persisted best score per user.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub user_id: String,
    pub username: String,
    pub wpm: u32,
    pub accuracy: f64,
    pub test_duration_secs: u64,
    pub characters_typed: usize,
    pub correct_chars: usize,
    pub incorrect_chars: usize,
    pub competitive: bool,
    pub updated_at: DateTime<Local>,
}

impl ScoreRecord {
    /// The stored record never regresses: higher wpm wins, accuracy breaks
    /// ties.
    pub fn improves_on(&self, existing: Option<&ScoreRecord>) -> bool {
        match existing {
            None => true,
            Some(e) => self.wpm > e.wpm || (self.wpm == e.wpm && self.accuracy > e.accuracy),
        }
    }
}

/// Read-only leaderboard projection, ordered desc by wpm by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub username: String,
    pub wpm: u32,
    pub accuracy: f64,
    pub competitive: bool,
    pub updated_at: DateTime<Local>,
}

/// Narrow interface the engine consumes; the submitter never talks SQL.
pub trait ScoreStore {
    fn best_score(&self, user_id: &str) -> Result<Option<ScoreRecord>>;
    /// Last-writer-wins row replacement. Improvement semantics live in the
    /// submission service, not here.
    fn upsert_best_score(&self, record: &ScoreRecord) -> Result<()>;
    fn top_scores(&self, limit: usize) -> Result<Vec<LeaderboardEntry>>;
}

/// SQLite-backed store, one `best_scores` row per user.
#[derive(Debug)]
pub struct SqliteScoreStore {
    conn: Connection,
}

impl SqliteScoreStore {
    /// Open (and create, if needed) the store at the default state path.
    pub fn open_default() -> Result<Self> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("typometer_scores.db"));
        Self::open(&db_path)
    }

    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("failed to create state directory: {}", e)),
                )
            })?;
        }
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS best_scores (
                user_id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                wpm INTEGER NOT NULL,
                accuracy REAL NOT NULL,
                test_duration_secs INTEGER NOT NULL,
                characters_typed INTEGER NOT NULL,
                correct_chars INTEGER NOT NULL,
                incorrect_chars INTEGER NOT NULL,
                competitive BOOLEAN NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_best_scores_wpm ON best_scores(wpm DESC, accuracy DESC)",
            [],
        )?;

        Ok(SqliteScoreStore { conn })
    }
}

fn parse_timestamp(raw: &str, column: usize) -> Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                column,
                "updated_at".to_string(),
                rusqlite::types::Type::Text,
            )
        })
}

impl ScoreStore for SqliteScoreStore {
    fn best_score(&self, user_id: &str) -> Result<Option<ScoreRecord>> {
        self.conn
            .query_row(
                r#"
                SELECT user_id, username, wpm, accuracy, test_duration_secs,
                       characters_typed, correct_chars, incorrect_chars,
                       competitive, updated_at
                FROM best_scores WHERE user_id = ?1
                "#,
                [user_id],
                |row| {
                    let raw_ts: String = row.get(9)?;
                    Ok(ScoreRecord {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        wpm: row.get(2)?,
                        accuracy: row.get(3)?,
                        test_duration_secs: row.get::<_, i64>(4)? as u64,
                        characters_typed: row.get::<_, i64>(5)? as usize,
                        correct_chars: row.get::<_, i64>(6)? as usize,
                        incorrect_chars: row.get::<_, i64>(7)? as usize,
                        competitive: row.get(8)?,
                        updated_at: parse_timestamp(&raw_ts, 9)?,
                    })
                },
            )
            .optional()
    }

    fn upsert_best_score(&self, record: &ScoreRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO best_scores
            (user_id, username, wpm, accuracy, test_duration_secs,
             characters_typed, correct_chars, incorrect_chars, competitive, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                wpm = excluded.wpm,
                accuracy = excluded.accuracy,
                test_duration_secs = excluded.test_duration_secs,
                characters_typed = excluded.characters_typed,
                correct_chars = excluded.correct_chars,
                incorrect_chars = excluded.incorrect_chars,
                competitive = excluded.competitive,
                updated_at = excluded.updated_at
            "#,
            params![
                record.user_id,
                record.username,
                record.wpm,
                record.accuracy,
                record.test_duration_secs as i64,
                record.characters_typed as i64,
                record.correct_chars as i64,
                record.incorrect_chars as i64,
                record.competitive,
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn top_scores(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT username, wpm, accuracy, competitive, updated_at
            FROM best_scores
            ORDER BY wpm DESC, accuracy DESC, username ASC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let raw_ts: String = row.get(4)?;
            Ok(LeaderboardEntry {
                username: row.get(0)?,
                wpm: row.get(1)?,
                accuracy: row.get(2)?,
                competitive: row.get(3)?,
                updated_at: parse_timestamp(&raw_ts, 4)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}
