//! Local Trackio-compatible store.
//!
//! Each project lives in its own SQLite database, `<root>/<project>.db`, the
//! layout the Trackio dashboard reads.

use super::error::{TrackingError, TrackingResult};
use super::schema::initialize_schema;
use super::{MetricEntry, ResumeMode, RunLogger, RunSpec, RunStats, Tracker};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Pending rows are written in one transaction once this many accumulate.
const FLUSH_ROWS: usize = 256;

/// Connection to one project database.
pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    /// Opens (and creates if needed) the database at `path`.
    pub fn open(path: &Path) -> TrackingResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Opens an in-memory database for testing.
    pub fn open_in_memory() -> TrackingResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Whether the run has been registered or has logged anything.
    pub fn run_exists(&self, run: &str) -> TrackingResult<bool> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT 1 FROM configs WHERE run_name = ?1
             UNION ALL
             SELECT 1 FROM metrics WHERE run_name = ?1
             LIMIT 1",
        )?;
        Ok(stmt.exists([run])?)
    }

    /// Highest step logged for the run.
    pub fn last_step(&self, run: &str) -> TrackingResult<Option<u64>> {
        let step: Option<i64> = self
            .conn
            .query_row("SELECT MAX(step) FROM metrics WHERE run_name = ?1", [run], |row| row.get::<_, Option<i64>>(0))
            .optional()?
            .flatten();
        Ok(step.map(|s| s as u64))
    }

    /// Records the run's config, keeping the first one if the run is resumed.
    pub fn register_run(&self, run: &str, config: &Value) -> TrackingResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO configs (run_name, config, created_at) VALUES (?1, ?2, ?3)",
            params![run, serde_json::to_string(config)?, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn insert_metrics(&mut self, run: &str, rows: &[PendingRow]) -> TrackingResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO metrics (timestamp, run_name, step, metrics) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in rows {
                stmt.execute(params![row.timestamp, run, row.step as i64, row.metrics])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Number of entries logged for the run.
    pub fn metric_count(&self, run: &str) -> TrackingResult<u64> {
        let count: i64 =
            self.conn.query_row("SELECT COUNT(*) FROM metrics WHERE run_name = ?1", [run], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Registered run names, in creation order.
    pub fn run_names(&self) -> TrackingResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT run_name FROM configs ORDER BY id")?;
        let names = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Metrics of the run in step order, parsed back from JSON.
    pub fn run_metrics(&self, run: &str) -> TrackingResult<Vec<(u64, Value)>> {
        let mut stmt =
            self.conn.prepare("SELECT step, metrics FROM metrics WHERE run_name = ?1 ORDER BY step, id")?;
        let rows = stmt
            .query_map([run], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(step, metrics)| Ok((step as u64, serde_json::from_str(&metrics)?)))
            .collect()
    }
}

#[derive(Debug, Clone)]
struct PendingRow {
    timestamp: String,
    step: u64,
    metrics: String,
}

/// Tracker writing into the local store.
#[derive(Debug, Clone)]
pub struct LocalTracker {
    root: PathBuf,
}

impl LocalTracker {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Database file of a project.
    #[must_use]
    pub fn project_db_path(&self, project: &str) -> PathBuf {
        self.root.join(format!("{}.db", project.replace(['/', '\\'], "-")))
    }

    pub fn open_store(&self, project: &str) -> TrackingResult<LocalStore> {
        LocalStore::open(&self.project_db_path(project))
    }

    /// Opens a run, honouring its resume mode.
    pub fn open_run(&self, spec: &RunSpec) -> TrackingResult<LocalRunLogger> {
        let store = self.open_store(&spec.project)?;
        LocalRunLogger::open(store, spec)
    }
}

#[async_trait]
impl Tracker for LocalTracker {
    fn id(&self) -> &'static str {
        "local"
    }

    async fn start_run(&self, spec: &RunSpec) -> TrackingResult<Box<dyn RunLogger>> {
        Ok(Box::new(self.open_run(spec)?))
    }
}

/// Run opened in a local store.
///
/// Entries are buffered and written in batches; call `finish` (or `close`) to
/// write the remainder.
pub struct LocalRunLogger {
    store: LocalStore,
    run: String,
    next_step: u64,
    pending: Vec<PendingRow>,
    points: u64,
}

impl LocalRunLogger {
    pub fn open(store: LocalStore, spec: &RunSpec) -> TrackingResult<Self> {
        let exists = store.run_exists(&spec.name)?;
        match spec.resume {
            ResumeMode::Must if !exists => {
                return Err(TrackingError::RunNotFound { project: spec.project.clone(), run: spec.name.clone() });
            }
            ResumeMode::Never if exists => {
                return Err(TrackingError::RunExists { project: spec.project.clone(), run: spec.name.clone() });
            }
            _ => {}
        }

        let next_step = store.last_step(&spec.name)?.map_or(0, |s| s + 1);
        store.register_run(
            &spec.name,
            &serde_json::json!({ "project": spec.project, "space_id": spec.space_id }),
        )?;

        if exists {
            tracing::debug!(project = %spec.project, run = %spec.name, next_step, "resuming run");
        }

        Ok(Self {
            store,
            run: spec.name.clone(),
            next_step,
            pending: Vec::new(),
            points: 0,
        })
    }

    /// Step the next entry will be stored at.
    #[must_use]
    pub fn next_step(&self) -> u64 {
        self.next_step
    }

    /// Buffers one entry and returns the step it was assigned.
    pub fn record(&mut self, entry: &MetricEntry) -> TrackingResult<u64> {
        let step = self.next_step;
        self.pending.push(PendingRow {
            timestamp: Utc::now().to_rfc3339(),
            step,
            metrics: serde_json::to_string(&entry.to_metrics())?,
        });
        self.next_step += 1;
        self.points += 1;

        if self.pending.len() >= FLUSH_ROWS {
            self.flush()?;
        }
        Ok(step)
    }

    pub fn flush(&mut self) -> TrackingResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.pending);
        self.store.insert_metrics(&self.run, &rows)
    }

    pub fn close(mut self) -> TrackingResult<RunStats> {
        self.flush()?;
        Ok(RunStats { run: self.run, points: self.points })
    }
}

#[async_trait]
impl RunLogger for LocalRunLogger {
    fn name(&self) -> &str {
        &self.run
    }

    async fn log(&mut self, entry: &MetricEntry) -> TrackingResult<()> {
        self.record(entry).map(|_| ())
    }

    async fn finish(self: Box<Self>) -> TrackingResult<RunStats> {
        (*self).close()
    }
}
