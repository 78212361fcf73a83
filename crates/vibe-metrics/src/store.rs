//! SQLite stage-transition log.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use vibe_core::{Stage, StageTransition, VibeError};

const SCHEMA_VERSION: i64 = 1;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TransitionStore {
    conn: Connection,
}

impl TransitionStore {
    /// Open (or create) the log at `path`, enable WAL, and create the
    /// schema if needed.
    pub fn open(path: &Path) -> Result<Self, VibeError> {
        let conn = Connection::open(path)
            .map_err(|e| VibeError::storage(format!("open {}", path.display()), e))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| VibeError::storage("set busy timeout", e))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(|e| VibeError::storage("enable WAL", e))?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory log. Useful for testing.
    pub fn open_in_memory() -> Result<Self, VibeError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| VibeError::storage("open in-memory metrics", e))?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), VibeError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS schema_version (
                    version    INTEGER PRIMARY KEY,
                    applied_at TEXT
                );
                CREATE TABLE IF NOT EXISTS stage_transitions (
                    id              TEXT PRIMARY KEY,
                    project_id      TEXT NOT NULL,
                    from_stage      TEXT NOT NULL,
                    to_stage        TEXT NOT NULL,
                    transitioned_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_stage_transitions_project
                    ON stage_transitions(project_id);
                CREATE INDEX IF NOT EXISTS idx_stage_transitions_time
                    ON stage_transitions(transitioned_at);",
            )
            .map_err(|e| VibeError::storage("migrate metrics schema", e))?;
        self.conn
            .execute(
                "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                params![SCHEMA_VERSION, ts_to_sql(Utc::now())],
            )
            .map_err(|e| VibeError::storage("record metrics schema version", e))?;
        Ok(())
    }

    pub fn insert(&self, transition: &StageTransition) -> Result<(), VibeError> {
        self.conn
            .execute(
                "INSERT INTO stage_transitions
                    (id, project_id, from_stage, to_stage, transitioned_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    transition.id,
                    transition.project_id,
                    transition.from_stage_str(),
                    transition.to_stage.as_str(),
                    ts_to_sql(transition.transitioned_at),
                ],
            )
            .map_err(|e| VibeError::storage("insert stage transition", e))?;
        Ok(())
    }

    /// Every transition recorded for `project_id`, oldest first.
    pub fn transitions_for(&self, project_id: &str) -> Result<Vec<StageTransition>, VibeError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, project_id, from_stage, to_stage, transitioned_at
                 FROM stage_transitions
                 WHERE project_id = ?1
                 ORDER BY transitioned_at, id",
            )
            .map_err(|e| VibeError::storage("query stage transitions", e))?;

        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|e| VibeError::storage("query stage transitions", e))?;

        let mut result = Vec::new();
        for row in rows {
            let (id, project_id, from, to, at) =
                row.map_err(|e| VibeError::storage("read stage transition", e))?;
            let from_stage = if from.is_empty() {
                None
            } else {
                Some(from.parse::<Stage>()?)
            };
            result.push(StageTransition {
                id,
                project_id,
                from_stage,
                to_stage: to.parse::<Stage>()?,
                transitioned_at: DateTime::parse_from_rfc3339(&at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| VibeError::storage(format!("parse timestamp {at:?}"), e))?,
            });
        }
        Ok(result)
    }

    pub fn count(&self) -> Result<u64, VibeError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM stage_transitions", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n.max(0) as u64)
            .map_err(|e| VibeError::storage("count stage transitions", e))
    }
}

fn ts_to_sql(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
