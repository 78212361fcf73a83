//! Per-project SQLite state: one row holding the project record.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use vibe_core::{Confidence, Method, Project, ProjectState, Stage, VibeError};

const SCHEMA_VERSION: i64 = 1;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ProjectDb {
    conn: Connection,
}

fn db_err(context: &str) -> impl FnOnce(rusqlite::Error) -> VibeError + '_ {
    move |e| VibeError::storage(context, e)
}

impl ProjectDb {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self, VibeError> {
        let conn = Connection::open(path).map_err(db_err("open project state"))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(db_err("set busy timeout"))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(db_err("enable WAL"))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// In-memory database. Useful for testing.
    pub fn open_in_memory() -> Result<Self, VibeError> {
        let conn = Connection::open_in_memory().map_err(db_err("open in-memory state"))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), VibeError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS schema_version (
                    version     INTEGER PRIMARY KEY,
                    applied_at  TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS project (
                    singleton           INTEGER PRIMARY KEY CHECK (singleton = 1),
                    id                  TEXT NOT NULL,
                    canonical_path      TEXT NOT NULL,
                    name                TEXT NOT NULL,
                    display_name        TEXT,
                    detected_method     TEXT NOT NULL,
                    current_stage       TEXT NOT NULL,
                    confidence          TEXT NOT NULL,
                    detection_reasoning TEXT NOT NULL DEFAULT '',
                    coexisting_methods  TEXT NOT NULL DEFAULT '',
                    state               TEXT NOT NULL,
                    is_favorite         INTEGER NOT NULL DEFAULT 0,
                    notes               TEXT NOT NULL DEFAULT '',
                    last_activity_at    TEXT NOT NULL,
                    hibernated_at       TEXT,
                    created_at          TEXT NOT NULL,
                    updated_at          TEXT NOT NULL
                );",
            )
            .map_err(db_err("migrate project state"))?;
        self.conn
            .execute(
                "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                params![SCHEMA_VERSION, ts_to_sql(Utc::now())],
            )
            .map_err(db_err("record schema version"))?;
        Ok(())
    }

    /// Upsert the project row.
    pub fn save(&self, project: &Project) -> Result<(), VibeError> {
        let coexisting: Vec<&str> = project.coexisting_methods.iter().map(|m| m.as_str()).collect();
        self.conn
            .execute(
                "INSERT OR REPLACE INTO project
                    (singleton, id, canonical_path, name, display_name,
                     detected_method, current_stage, confidence, detection_reasoning,
                     coexisting_methods, state, is_favorite, notes,
                     last_activity_at, hibernated_at, created_at, updated_at)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    project.id,
                    project.canonical_path.to_string_lossy().into_owned(),
                    project.name,
                    project.display_name,
                    project.detected_method.as_str(),
                    project.current_stage.as_str(),
                    project.confidence.as_str(),
                    project.detection_reasoning,
                    coexisting.join(","),
                    project.state.as_str(),
                    project.is_favorite,
                    project.notes,
                    ts_to_sql(project.last_activity_at),
                    project.hibernated_at.map(ts_to_sql),
                    ts_to_sql(project.created_at),
                    ts_to_sql(project.updated_at),
                ],
            )
            .map_err(db_err("save project"))?;
        Ok(())
    }

    /// Load the project row, if one has been saved.
    pub fn load(&self) -> Result<Option<Project>, VibeError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, canonical_path, name, display_name,
                        detected_method, current_stage, confidence, detection_reasoning,
                        coexisting_methods, state, is_favorite, notes,
                        last_activity_at, hibernated_at, created_at, updated_at
                 FROM project WHERE singleton = 1",
                [],
                |row| {
                    Ok(RawProject {
                        id: row.get(0)?,
                        canonical_path: row.get(1)?,
                        name: row.get(2)?,
                        display_name: row.get(3)?,
                        detected_method: row.get(4)?,
                        current_stage: row.get(5)?,
                        confidence: row.get(6)?,
                        detection_reasoning: row.get(7)?,
                        coexisting_methods: row.get(8)?,
                        state: row.get(9)?,
                        is_favorite: row.get(10)?,
                        notes: row.get(11)?,
                        last_activity_at: row.get(12)?,
                        hibernated_at: row.get(13)?,
                        created_at: row.get(14)?,
                        updated_at: row.get(15)?,
                    })
                },
            )
            .optional()
            .map_err(db_err("load project"))?;
        row.map(RawProject::into_project).transpose()
    }
}

/// Column values as stored, before enum and timestamp parsing.
struct RawProject {
    id: String,
    canonical_path: String,
    name: String,
    display_name: Option<String>,
    detected_method: String,
    current_stage: String,
    confidence: String,
    detection_reasoning: String,
    coexisting_methods: String,
    state: String,
    is_favorite: bool,
    notes: String,
    last_activity_at: String,
    hibernated_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawProject {
    fn into_project(self) -> Result<Project, VibeError> {
        let coexisting_methods = self
            .coexisting_methods
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::parse::<Method>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Project {
            id: self.id,
            canonical_path: PathBuf::from(self.canonical_path),
            name: self.name,
            display_name: self.display_name,
            detected_method: self.detected_method.parse::<Method>()?,
            current_stage: self.current_stage.parse::<Stage>()?,
            confidence: self.confidence.parse::<Confidence>()?,
            detection_reasoning: self.detection_reasoning,
            coexisting_methods,
            state: self.state.parse::<ProjectState>()?,
            is_favorite: self.is_favorite,
            notes: self.notes,
            last_activity_at: ts_from_sql(&self.last_activity_at)?,
            hibernated_at: self.hibernated_at.as_deref().map(ts_from_sql).transpose()?,
            created_at: ts_from_sql(&self.created_at)?,
            updated_at: ts_from_sql(&self.updated_at)?,
        })
    }
}

pub(crate) fn ts_to_sql(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn ts_from_sql(value: &str) -> Result<DateTime<Utc>, VibeError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| VibeError::storage(format!("parse timestamp {value:?}"), e))
}

/// Remove `state.db` and its WAL/SHM side files. Missing files are fine.
pub fn remove_state_files(db_path: &Path) -> Result<(), VibeError> {
    let mut paths = vec![db_path.to_path_buf()];
    for suffix in ["-wal", "-shm"] {
        let mut side = db_path.as_os_str().to_owned();
        side.push(suffix);
        paths.push(PathBuf::from(side));
    }
    for path in paths {
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(VibeError::io(format!("remove {}", path.display()), e)),
        }
    }
    Ok(())
}
