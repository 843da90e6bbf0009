use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

pub fn connect(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS snapshots (
            id         INTEGER PRIMARY KEY,
            url        TEXT NOT NULL,
            markdown   TEXT,
            status     INTEGER,
            error      TEXT,
            latency_ms INTEGER,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_snapshots_url ON snapshots(url);

        CREATE TABLE IF NOT EXISTS runs (
            id          INTEGER PRIMARY KEY,
            snapshot_id INTEGER NOT NULL REFERENCES snapshots(id),
            types       INTEGER NOT NULL,
            methods     INTEGER NOT NULL,
            primitives  INTEGER NOT NULL,
            failures    INTEGER NOT NULL,
            ran_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_runs_snapshot ON runs(snapshot_id);
        ",
    )?;
    Ok(())
}

// ── Snapshots ──

/// One retrieval attempt of the reference page.
pub struct SnapshotRow {
    pub url: String,
    pub markdown: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

pub fn save_snapshot(conn: &Connection, row: &SnapshotRow) -> Result<i64> {
    conn.execute(
        "INSERT INTO snapshots (url, markdown, status, error, latency_ms)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![row.url, row.markdown, row.status, row.error, row.latency_ms],
    )?;
    Ok(conn.last_insert_rowid())
}

pub struct Snapshot {
    pub id: i64,
    pub url: String,
    pub markdown: String,
    pub fetched_at: String,
}

/// Newest snapshot of `url` that actually holds markdown.
pub fn latest_snapshot(conn: &Connection, url: &str) -> Result<Option<Snapshot>> {
    let snapshot = conn
        .query_row(
            "SELECT id, url, markdown, fetched_at
             FROM snapshots
             WHERE url = ?1 AND markdown IS NOT NULL AND error IS NULL
             ORDER BY id DESC
             LIMIT 1",
            [url],
            |row| {
                Ok(Snapshot {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    markdown: row.get(2)?,
                    fetched_at: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(snapshot)
}

// ── Runs ──

pub struct RunRow {
    pub snapshot_id: i64,
    pub types: usize,
    pub methods: usize,
    pub primitives: usize,
    pub failures: usize,
}

pub fn save_run(conn: &Connection, row: &RunRow) -> Result<()> {
    conn.execute(
        "INSERT INTO runs (snapshot_id, types, methods, primitives, failures)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            row.snapshot_id,
            row.types as i64,
            row.methods as i64,
            row.primitives as i64,
            row.failures as i64,
        ],
    )?;
    Ok(())
}

// ── Stats ──

pub struct Stats {
    pub snapshots: usize,
    pub fetch_errors: usize,
    pub runs: usize,
    pub last_fetch: Option<String>,
    pub last_run: Option<RunRow>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let snapshots: usize = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |r| r.get(0))?;
    let fetch_errors: usize = conn.query_row(
        "SELECT COUNT(*) FROM snapshots WHERE error IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let runs: usize = conn.query_row("SELECT COUNT(*) FROM runs", [], |r| r.get(0))?;
    let last_fetch: Option<String> =
        conn.query_row("SELECT MAX(fetched_at) FROM snapshots", [], |r| r.get(0))?;
    let last_run = conn
        .query_row(
            "SELECT snapshot_id, types, methods, primitives, failures
             FROM runs ORDER BY id DESC LIMIT 1",
            [],
            |r| {
                Ok(RunRow {
                    snapshot_id: r.get(0)?,
                    types: r.get(1)?,
                    methods: r.get(2)?,
                    primitives: r.get(3)?,
                    failures: r.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(Stats {
        snapshots,
        fetch_errors,
        runs,
        last_fetch,
        last_run,
    })
}
