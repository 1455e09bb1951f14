use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::repository::{StorageError, SubmissionRecord, SubmissionRepository};
use crate::prediction::{Feature, FeatureVector};

const SELECT_COLUMNS: &str = "id, user, emotional_state, sleep_duration_hours, screen_time_minutes,
     physical_activity_minutes, hour, weekday, sunlight_hours, safety, daily_goal_progress,
     suggestion, previous_suggestion, created_at";

/// Submission store backed by the `data` table of a SQLite file.
pub struct SqliteSubmissionRepository {
    conn: Mutex<Connection>,
}

impl SqliteSubmissionRepository {
    /// Opens (creating if needed) the database file and applies the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS data (
            id                        INTEGER PRIMARY KEY AUTOINCREMENT,
            user                      TEXT NOT NULL,
            emotional_state           INTEGER,
            sleep_duration_hours      REAL,
            screen_time_minutes       REAL,
            physical_activity_minutes REAL,
            hour                      REAL,
            weekday                   REAL,
            sunlight_hours            REAL,
            safety                    REAL,
            daily_goal_progress       REAL,
            previous_suggestion       TEXT
        );",
    )?;

    // Tables created by older releases lack these columns.
    add_column_if_missing(conn, "suggestion", "TEXT")?;
    add_column_if_missing(conn, "created_at", "TEXT")?;
    Ok(())
}

fn add_column_if_missing(
    conn: &Connection,
    column: &str,
    definition: &str,
) -> Result<(), rusqlite::Error> {
    let present: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info('data') WHERE name = ?1",
        params![column],
        |row| row.get(0),
    )?;
    if present == 0 {
        conn.execute_batch(&format!("ALTER TABLE data ADD COLUMN {column} {definition};"))?;
    }
    Ok(())
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    let metric = |index: usize| -> rusqlite::Result<f64> {
        Ok(row.get::<_, Option<f64>>(index)?.unwrap_or(0.0))
    };

    let mut metrics = FeatureVector::default();
    metrics.set(Feature::SleepDurationHours, metric(3)?);
    metrics.set(Feature::ScreenTimeMinutes, metric(4)?);
    metrics.set(Feature::PhysicalActivityMinutes, metric(5)?);
    metrics.set(Feature::Hour, metric(6)?);
    metrics.set(Feature::Weekday, metric(7)?);
    metrics.set(Feature::SunlightHours, metric(8)?);
    metrics.set(Feature::Safety, metric(9)?);
    metrics.set(Feature::DailyGoalProgression, metric(10)?);

    Ok(RawRecord {
        id: row.get(0)?,
        user: row.get(1)?,
        mental_state: row.get(2)?,
        metrics,
        suggestion: row.get(11)?,
        summary: row.get(12)?,
        created_at: row.get(13)?,
    })
}

struct RawRecord {
    id: i64,
    user: String,
    mental_state: Option<i64>,
    metrics: FeatureVector,
    suggestion: Option<String>,
    summary: Option<String>,
    created_at: Option<String>,
}

impl RawRecord {
    fn into_record(self) -> Result<SubmissionRecord, StorageError> {
        let created_at = match self.created_at.as_deref() {
            Some(stamp) => DateTime::parse_from_rfc3339(stamp)?.with_timezone(&Utc),
            None => DateTime::<Utc>::UNIX_EPOCH,
        };

        Ok(SubmissionRecord {
            id: self.id,
            user: self.user,
            metrics: self.metrics,
            mental_state: self
                .mental_state
                .map(|state| state.clamp(0, 100) as u8),
            suggestion: self.suggestion,
            summary: self.summary,
            created_at,
        })
    }
}

impl SubmissionRepository for SqliteSubmissionRepository {
    fn insert(&self, user: &str, metrics: &FeatureVector) -> Result<i64, StorageError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO data (
                user, emotional_state, sleep_duration_hours, screen_time_minutes,
                physical_activity_minutes, hour, weekday, sunlight_hours, safety,
                daily_goal_progress, created_at
             ) VALUES (?1, NULL, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                user,
                metrics.get(Feature::SleepDurationHours),
                metrics.get(Feature::ScreenTimeMinutes),
                metrics.get(Feature::PhysicalActivityMinutes),
                metrics.get(Feature::Hour),
                metrics.get(Feature::Weekday),
                metrics.get(Feature::SunlightHours),
                metrics.get(Feature::Safety),
                metrics.get(Feature::DailyGoalProgression),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn record_result(
        &self,
        id: i64,
        mental_state: u8,
        suggestion: &str,
        summary: &str,
    ) -> Result<(), StorageError> {
        let updated = self.conn().execute(
            "UPDATE data
             SET emotional_state = ?1, suggestion = ?2, previous_suggestion = ?3
             WHERE id = ?4",
            params![mental_state, suggestion, summary.trim(), id],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(id));
        }
        Ok(())
    }

    fn fetch(&self, id: i64) -> Result<Option<SubmissionRecord>, StorageError> {
        let raw = self
            .conn()
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM data WHERE id = ?1"),
                params![id],
                read_record,
            )
            .optional()?;
        raw.map(RawRecord::into_record).transpose()
    }

    fn latest_result(&self) -> Result<Option<SubmissionRecord>, StorageError> {
        let raw = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM data
                     WHERE emotional_state IS NOT NULL
                     ORDER BY id DESC LIMIT 1"
                ),
                [],
                read_record,
            )
            .optional()?;
        raw.map(RawRecord::into_record).transpose()
    }

    fn history(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT previous_suggestion FROM data
             WHERE previous_suggestion IS NOT NULL AND previous_suggestion != ''
             ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let history = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(history)
    }
}
