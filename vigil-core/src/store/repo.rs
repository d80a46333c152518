//! Telemetry store: query events and Auto Run records in SQLite
//!
//! One connection behind a mutex; SQLite itself serializes writers against
//! the file. Lifecycle is explicit: `initialize` opens the file, migrates
//! the schema (fatal on failure), and runs due maintenance; `close` is
//! terminal and every later call fails with [`Error::StoreClosed`].

use crate::config::MaintenanceConfig;
use crate::error::{Error, Result};
use crate::types::{
    AgentKind, AutoRunSession, AutoRunTask, AutoRunTaskStatus, QueryEvent, QuerySource, TimeRange,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ToSql};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// At most one vacuum per process, however many stores get initialized.
static VACUUM_RAN: AtomicBool = AtomicBool::new(false);

/// Fields for a new query event; the store generates the id.
#[derive(Debug, Clone)]
pub struct NewQueryEvent {
    pub session_id: String,
    pub agent_type: AgentKind,
    pub source: QuerySource,
    /// Epoch milliseconds
    pub start_time: i64,
    /// Milliseconds; zero is valid
    pub duration: i64,
    pub project_path: Option<String>,
    pub tab_id: Option<String>,
    pub is_remote: Option<bool>,
}

/// Optional narrowing filters for event retrieval; all are ANDed.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub agent_type: Option<AgentKind>,
    pub source: Option<QuerySource>,
    pub project_path: Option<String>,
    pub session_id: Option<String>,
}

/// Rolled-up event statistics for one time range.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedStats {
    pub total_queries: i64,
    /// Milliseconds
    pub total_duration: i64,
    /// Milliseconds; 0 when there are no queries
    pub avg_duration: f64,
    pub by_agent: BTreeMap<String, i64>,
    /// Always contains both `user` and `auto` keys
    pub by_source: BTreeMap<String, i64>,
    /// Keyed by `YYYY-MM-DD`
    pub by_day: BTreeMap<String, i64>,
}

/// Durable store for query events and Auto Run records.
pub struct TelemetryStore {
    conn: Mutex<Connection>,
    closed: AtomicBool,
}

impl TelemetryStore {
    /// Open or create the store, migrate the schema, and run due
    /// maintenance. Migration failure is fatal; the store never comes up
    /// against a half-migrated schema.
    pub fn initialize(path: &Path, maintenance: &MaintenanceConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        super::schema::run_migrations(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            closed: AtomicBool::new(false),
        };

        if let Err(e) = store.maybe_vacuum(path, maintenance) {
            // Maintenance failure degrades, it does not block startup
            tracing::warn!(error = %e, "Store maintenance failed, continuing");
        }

        Ok(store)
    }

    /// In-memory store for tests; no file, no maintenance.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        super::schema::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            closed: AtomicBool::new(false),
        })
    }

    /// Mark the store closed. Terminal: every subsequent operation fails.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        tracing::info!("Telemetry store closed");
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::StoreClosed);
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // Maintenance
    // ============================================

    /// Vacuum when the sidecar timestamp is older than the configured
    /// interval: back the file up first, then compact, then rewrite the
    /// timestamp. Guarded so concurrent initializers cannot double-run it.
    fn maybe_vacuum(&self, path: &Path, maintenance: &MaintenanceConfig) -> Result<()> {
        let sidecar = vacuum_sidecar_path(path);
        let last = std::fs::read_to_string(&sidecar)
            .ok()
            .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let interval = chrono::Duration::days(maintenance.vacuum_interval_days as i64);
        let due = match last {
            Some(ts) => Utc::now() - ts >= interval,
            None => true,
        };
        if !due {
            return Ok(());
        }

        if VACUUM_RAN
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        let backup = backup_path(path);
        if path.exists() {
            std::fs::copy(path, &backup)?;
        }

        tracing::info!(path = %path.display(), "Vacuuming telemetry store");
        self.lock().execute_batch("VACUUM")?;
        std::fs::write(&sidecar, Utc::now().to_rfc3339())?;
        Ok(())
    }

    // ============================================
    // Query events
    // ============================================

    /// Insert one event, returning the generated id. Absent optional
    /// fields persist as NULL.
    pub fn insert_query_event(&self, event: &NewQueryEvent) -> Result<String> {
        self.check_open()?;
        let id = uuid::Uuid::new_v4().to_string();
        self.lock().execute(
            r#"
            INSERT INTO query_events
                (id, session_id, agent_type, source, start_time, duration,
                 project_path, tab_id, is_remote)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            rusqlite::params![
                id,
                event.session_id,
                event.agent_type.as_str(),
                event.source.as_str(),
                event.start_time,
                event.duration,
                event.project_path,
                event.tab_id,
                event.is_remote,
            ],
        )?;
        Ok(id)
    }

    /// Events in a time range, newest first, optionally narrowed by
    /// filter fields.
    pub fn get_query_events(
        &self,
        range: TimeRange,
        filter: &QueryFilter,
    ) -> Result<Vec<QueryEvent>> {
        self.check_open()?;

        let mut sql = String::from(
            "SELECT id, session_id, agent_type, source, start_time, duration,
                    project_path, tab_id, is_remote
             FROM query_events WHERE 1 = 1",
        );
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(bound) = range.start_bound_ms(Utc::now()) {
            sql.push_str(" AND start_time >= ?");
            params.push(Box::new(bound));
        }
        if let Some(agent) = filter.agent_type {
            sql.push_str(" AND agent_type = ?");
            params.push(Box::new(agent.as_str()));
        }
        if let Some(source) = filter.source {
            sql.push_str(" AND source = ?");
            params.push(Box::new(source.as_str()));
        }
        if let Some(ref project_path) = filter.project_path {
            sql.push_str(" AND project_path = ?");
            params.push(Box::new(project_path.clone()));
        }
        if let Some(ref session_id) = filter.session_id {
            sql.push_str(" AND session_id = ?");
            params.push(Box::new(session_id.clone()));
        }
        sql.push_str(" ORDER BY start_time DESC");

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, Option<bool>>(8)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, session_id, agent, source, start_time, duration, project_path, tab_id, is_remote) =
                row.map_err(|e| Error::CorruptRecord {
                    table: "query_events".to_string(),
                    message: e.to_string(),
                })?;
            events.push(QueryEvent {
                id,
                session_id,
                agent_type: agent.parse().map_err(|e: String| Error::CorruptRecord {
                    table: "query_events".to_string(),
                    message: e,
                })?,
                source: source.parse().map_err(|e: String| Error::CorruptRecord {
                    table: "query_events".to_string(),
                    message: e,
                })?,
                start_time,
                duration,
                project_path,
                tab_id,
                is_remote,
            });
        }
        Ok(events)
    }

    /// Aggregate counts and durations over a time range.
    ///
    /// `avg_duration` is 0 when there are no queries. `by_source` always
    /// carries both `user` and `auto` keys so consumers need no presence
    /// checks.
    pub fn get_aggregated_stats(&self, range: TimeRange) -> Result<AggregatedStats> {
        self.check_open()?;
        let bound = range.start_bound_ms(Utc::now()).unwrap_or(i64::MIN);
        let conn = self.lock();

        let (total_queries, total_duration): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration), 0)
             FROM query_events WHERE start_time >= ?1",
            [bound],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;

        let avg_duration = if total_queries > 0 {
            total_duration as f64 / total_queries as f64
        } else {
            0.0
        };

        let mut by_agent = BTreeMap::new();
        let mut stmt = conn.prepare(
            "SELECT agent_type, COUNT(*) FROM query_events
             WHERE start_time >= ?1 GROUP BY agent_type",
        )?;
        let rows = stmt.query_map([bound], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
        for row in rows {
            let (agent, count) = row?;
            by_agent.insert(agent, count);
        }

        let mut by_source = BTreeMap::new();
        by_source.insert("user".to_string(), 0);
        by_source.insert("auto".to_string(), 0);
        let mut stmt = conn.prepare(
            "SELECT source, COUNT(*) FROM query_events
             WHERE start_time >= ?1 GROUP BY source",
        )?;
        let rows = stmt.query_map([bound], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
        for row in rows {
            let (source, count) = row?;
            by_source.insert(source, count);
        }

        let mut by_day = BTreeMap::new();
        let mut stmt = conn.prepare(
            "SELECT strftime('%Y-%m-%d', start_time / 1000, 'unixepoch'), COUNT(*)
             FROM query_events WHERE start_time >= ?1 GROUP BY 1",
        )?;
        let rows = stmt.query_map([bound], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
        for row in rows {
            let (day, count) = row?;
            by_day.insert(day, count);
        }

        Ok(AggregatedStats {
            total_queries,
            total_duration,
            avg_duration,
            by_agent,
            by_source,
            by_day,
        })
    }

    /// Export events in a time range as CSV text. An empty result still
    /// yields the header line.
    pub fn export_csv(&self, range: TimeRange) -> Result<String> {
        let events = self.get_query_events(range, &QueryFilter::default())?;

        let mut out =
            String::from("id,sessionId,agentType,source,startTime,duration,projectPath,tabId,isRemote\n");
        for event in &events {
            let fields = [
                csv_field(&event.id),
                csv_field(&event.session_id),
                csv_field(event.agent_type.as_str()),
                csv_field(event.source.as_str()),
                event.start_time.to_string(),
                event.duration.to_string(),
                event.project_path.as_deref().map(csv_field).unwrap_or_default(),
                event.tab_id.as_deref().map(csv_field).unwrap_or_default(),
                event
                    .is_remote
                    .map(|b| b.to_string())
                    .unwrap_or_default(),
            ];
            out.push_str(&fields.join(","));
            out.push('\n');
        }
        Ok(out)
    }

    // ============================================
    // Auto Run records
    // ============================================

    /// Begin tracking a batch run, returning its generated id.
    pub fn start_auto_run(&self, doc_path: &str, total_tasks: i64) -> Result<String> {
        self.check_open()?;
        let id = uuid::Uuid::new_v4().to_string();
        self.lock().execute(
            "INSERT INTO auto_run_sessions (id, doc_path, started_at, total_tasks)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id, doc_path, Utc::now().timestamp_millis(), total_tasks],
        )?;
        Ok(id)
    }

    /// Record one task outcome and bump the parent run's counters.
    pub fn record_auto_run_task(
        &self,
        run_id: &str,
        task_index: i64,
        started_at: i64,
        ended_at: Option<i64>,
        status: AutoRunTaskStatus,
        error: Option<&str>,
    ) -> Result<String> {
        self.check_open()?;
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.lock();
        conn.execute(
            "INSERT INTO auto_run_tasks (id, run_id, task_index, started_at, ended_at, status, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![id, run_id, task_index, started_at, ended_at, status.as_str(), error],
        )?;
        match status {
            AutoRunTaskStatus::Completed => {
                conn.execute(
                    "UPDATE auto_run_sessions SET completed_tasks = completed_tasks + 1 WHERE id = ?1",
                    [run_id],
                )?;
            }
            AutoRunTaskStatus::Failed => {
                conn.execute(
                    "UPDATE auto_run_sessions SET failed_tasks = failed_tasks + 1 WHERE id = ?1",
                    [run_id],
                )?;
            }
            AutoRunTaskStatus::Skipped => {}
        }
        Ok(id)
    }

    /// Mark a run finished.
    pub fn finish_auto_run(&self, run_id: &str) -> Result<()> {
        self.check_open()?;
        self.lock().execute(
            "UPDATE auto_run_sessions SET ended_at = ?1 WHERE id = ?2",
            rusqlite::params![Utc::now().timestamp_millis(), run_id],
        )?;
        Ok(())
    }

    /// Runs started within the time range, newest first.
    pub fn get_auto_run_sessions(&self, range: TimeRange) -> Result<Vec<AutoRunSession>> {
        self.check_open()?;
        let bound = range.start_bound_ms(Utc::now()).unwrap_or(i64::MIN);
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, doc_path, started_at, ended_at, total_tasks, completed_tasks, failed_tasks
             FROM auto_run_sessions WHERE started_at >= ?1 ORDER BY started_at DESC",
        )?;
        let rows = stmt.query_map([bound], |r| {
            Ok(AutoRunSession {
                id: r.get(0)?,
                doc_path: r.get(1)?,
                started_at: r.get(2)?,
                ended_at: r.get(3)?,
                total_tasks: r.get(4)?,
                completed_tasks: r.get(5)?,
                failed_tasks: r.get(6)?,
            })
        })?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row.map_err(|e| Error::CorruptRecord {
                table: "auto_run_sessions".to_string(),
                message: e.to_string(),
            })?);
        }
        Ok(sessions)
    }

    /// Tasks of one run, in document order.
    pub fn get_auto_run_tasks(&self, run_id: &str) -> Result<Vec<AutoRunTask>> {
        self.check_open()?;
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, run_id, task_index, started_at, ended_at, status, error
             FROM auto_run_tasks WHERE run_id = ?1 ORDER BY task_index",
        )?;
        let rows = stmt.query_map([run_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, i64>(2)?,
                r.get::<_, i64>(3)?,
                r.get::<_, Option<i64>>(4)?,
                r.get::<_, String>(5)?,
                r.get::<_, Option<String>>(6)?,
            ))
        })?;
        let mut tasks = Vec::new();
        for row in rows {
            let (id, run_id, task_index, started_at, ended_at, status, error) =
                row.map_err(|e| Error::CorruptRecord {
                    table: "auto_run_tasks".to_string(),
                    message: e.to_string(),
                })?;
            tasks.push(AutoRunTask {
                id,
                run_id,
                task_index,
                started_at,
                ended_at,
                status: status.parse().map_err(|e: String| Error::CorruptRecord {
                    table: "auto_run_tasks".to_string(),
                    message: e,
                })?,
                error,
            });
        }
        Ok(tasks)
    }
}

fn vacuum_sidecar_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(".last-vacuum");
    PathBuf::from(name)
}

fn backup_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(".backup");
    PathBuf::from(name)
}

/// Quote a CSV field only when it needs it.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
