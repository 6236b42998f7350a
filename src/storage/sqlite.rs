//! SQLite storage implementation.
//!
//! This module provides a SQLite-based implementation of the `RecordStore`
//! trait. A connection is opened per call and closed when the call returns;
//! all blocking database work runs on tokio's blocking pool.
//!
//! # Schema
//! A single `faculty` table. The schema only ever grows: each migration
//! creates the table, appends nullable text columns or adds an index, and
//! the applied version is tracked in `PRAGMA user_version`. Tables written
//! by older tools may lack the `UNIQUE` constraint on `profile_url`; the
//! `faculty_profile_url` index restores it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};

use super::{RecordStore, StorageError, StorageResult, UpsertOutcome};
use crate::models::FacultyRecord;

/// Schema version after all migrations have run.
pub const SCHEMA_VERSION: u32 = 4;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Every column a `FacultyRecord` is read from, in struct order.
const RECORD_COLUMNS: &[&str] = &[
    "id",
    "name",
    "profile_url",
    "education",
    "email",
    "phone",
    "address",
    "faculty_web",
    "biography",
    "specialization",
    "teaching",
    "publications",
    "research",
];

enum Step {
    Execute(&'static str),
    AddColumn(&'static str),
    /// Unique index that may fail on rows stored before it existed
    UniqueIndex(&'static str),
}

struct Migration {
    version: u32,
    steps: &'static [Step],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        steps: &[Step::Execute(
            "CREATE TABLE IF NOT EXISTS faculty (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT,
                education TEXT,
                email TEXT,
                phone TEXT,
                address TEXT,
                biography TEXT,
                specialization TEXT,
                profile_url TEXT UNIQUE
            )",
        )],
    },
    Migration {
        version: 2,
        steps: &[
            Step::AddColumn("teaching"),
            Step::AddColumn("publications"),
            Step::AddColumn("research"),
        ],
    },
    Migration {
        version: 3,
        steps: &[Step::AddColumn("faculty_web")],
    },
    Migration {
        version: 4,
        steps: &[
            Step::AddColumn("profile_url"),
            Step::UniqueIndex(
                "CREATE UNIQUE INDEX IF NOT EXISTS faculty_profile_url ON faculty(profile_url)",
            ),
        ],
    },
];

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::QueryError(err.to_string())
    }
}

/// SQLite-backed faculty record store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    /// Path to the SQLite database file
    db_path: PathBuf,
}

impl SqliteStore {
    /// Create a store for the database at `db_path`.
    ///
    /// Nothing is opened until the first operation.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Run `op` against the database path on the blocking pool.
    async fn run_blocking<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> StorageResult<T> + Send + 'static,
    {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || op(&path))
            .await
            .map_err(|e| StorageError::Other(format!("storage task failed: {}", e)))?
    }
}

fn open_read_write(path: &Path) -> StorageResult<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::ConnectionError(format!(
                    "cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }
    let conn = Connection::open(path)
        .map_err(|e| StorageError::ConnectionError(format!("{}: {}", path.display(), e)))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

fn open_existing(path: &Path, flags: OpenFlags) -> StorageResult<Connection> {
    if !path.exists() {
        return Err(StorageError::NoData(format!(
            "database file {} not found",
            path.display()
        )));
    }
    let conn = Connection::open_with_flags(path, flags)
        .map_err(|e| StorageError::ConnectionError(format!("{}: {}", path.display(), e)))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

fn table_columns(conn: &Connection) -> StorageResult<HashSet<String>> {
    let mut stmt = conn.prepare("PRAGMA table_info(faculty)")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(columns)
}

fn require_table(conn: &Connection) -> StorageResult<HashSet<String>> {
    let columns = table_columns(conn)?;
    if columns.is_empty() {
        return Err(StorageError::NoData("table 'faculty' does not exist".to_string()));
    }
    Ok(columns)
}

fn add_column(tx: &Transaction<'_>, column: &str) -> StorageResult<()> {
    let sql = format!("ALTER TABLE faculty ADD COLUMN {} TEXT", column);
    match tx.execute(&sql, []) {
        Ok(_) => info!("Added column faculty.{}", column),
        Err(e) if e.to_string().contains("duplicate column") => {
            debug!("Column faculty.{} already present", column);
        }
        Err(e) => {
            return Err(StorageError::SchemaError(format!(
                "cannot add column faculty.{}: {}",
                column, e
            )))
        }
    }
    Ok(())
}

fn create_unique_index(tx: &Transaction<'_>, sql: &str) -> StorageResult<()> {
    match tx.execute_batch(sql) {
        Ok(()) => Ok(()),
        Err(e) if e.to_string().contains("UNIQUE constraint failed") => {
            warn!(
                "Duplicate profile_url rows already stored; uniqueness not enforced: {}",
                e
            );
            Ok(())
        }
        Err(e) => Err(StorageError::SchemaError(e.to_string())),
    }
}

/// Apply pending migrations inside one exclusive transaction.
fn migrate(conn: &mut Connection) -> StorageResult<u32> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Exclusive)
        .map_err(|e| StorageError::SchemaError(e.to_string()))?;

    let current: i64 = tx.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    for migration in MIGRATIONS
        .iter()
        .filter(|m| i64::from(m.version) > current)
    {
        for step in migration.steps {
            match step {
                Step::Execute(sql) => tx
                    .execute_batch(sql)
                    .map_err(|e| StorageError::SchemaError(e.to_string()))?,
                Step::AddColumn(column) => add_column(&tx, column)?,
                Step::UniqueIndex(sql) => create_unique_index(&tx, sql)?,
            }
        }
        debug!("Applied schema migration {}", migration.version);
    }

    if current < i64::from(SCHEMA_VERSION) {
        tx.pragma_update(None, "user_version", i64::from(SCHEMA_VERSION))?;
        info!("Schema migrated from version {} to {}", current, SCHEMA_VERSION);
    }
    tx.commit()
        .map_err(|e| StorageError::SchemaError(e.to_string()))?;
    Ok(SCHEMA_VERSION)
}

fn select_all_sql(columns: &HashSet<String>) -> String {
    let projection = RECORD_COLUMNS
        .iter()
        .map(|column| {
            if columns.contains(*column) {
                (*column).to_string()
            } else {
                format!("NULL AS {}", column)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    let order = if columns.contains("id") { "id" } else { "rowid" };
    format!("SELECT {} FROM faculty ORDER BY {}", projection, order)
}

fn read_records(conn: &Connection) -> StorageResult<Vec<FacultyRecord>> {
    let columns = require_table(conn)?;
    let mut stmt = conn.prepare(&select_all_sql(&columns))?;
    let records = stmt
        .query_map([], |row| {
            Ok(FacultyRecord {
                id: row.get("id")?,
                name: row.get("name")?,
                profile_url: row.get("profile_url")?,
                education: row.get("education")?,
                email: row.get("email")?,
                phone: row.get("phone")?,
                address: row.get("address")?,
                faculty_web: row.get("faculty_web")?,
                biography: row.get("biography")?,
                specialization: row.get("specialization")?,
                teaching: row.get("teaching")?,
                publications: row.get("publications")?,
                research: row.get("research")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

fn insert_records(conn: &mut Connection, records: &[FacultyRecord]) -> StorageResult<UpsertOutcome> {
    require_table(conn)?;
    let tx = conn.transaction()?;
    let mut outcome = UpsertOutcome::default();
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO faculty (
                name, education, email, phone, address, faculty_web,
                biography, specialization, teaching, publications, research,
                profile_url
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )?;

        for record in records {
            let Some(profile_url) = record.profile_url.as_deref() else {
                warn!(
                    "Skipping record without profile_url: {}",
                    record.display_name()
                );
                outcome.missing_key += 1;
                continue;
            };

            let changed = stmt.execute(params![
                record.name,
                record.education,
                record.email,
                record.phone,
                record.address,
                record.faculty_web,
                record.biography,
                record.specialization,
                record.teaching,
                record.publications,
                record.research,
                profile_url,
            ])?;

            if changed == 0 {
                debug!("Already stored: {}", profile_url);
                outcome.ignored += 1;
            } else {
                outcome.inserted += 1;
            }
        }
    }
    tx.commit()?;
    Ok(outcome)
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn initialize(&self) -> StorageResult<u32> {
        self.run_blocking(|path| {
            let mut conn = open_read_write(path)?;
            migrate(&mut conn)
        })
        .await
    }

    async fn upsert_all(&self, records: &[FacultyRecord]) -> StorageResult<UpsertOutcome> {
        let records = records.to_vec();
        self.run_blocking(move |path| {
            let mut conn = open_existing(path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
            insert_records(&mut conn, &records)
        })
        .await
    }

    async fn read_all(&self) -> StorageResult<Vec<FacultyRecord>> {
        self.run_blocking(|path| {
            let conn = open_existing(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
            read_records(&conn)
        })
        .await
    }

    async fn count(&self) -> StorageResult<usize> {
        self.run_blocking(|path| {
            let conn = open_existing(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
            require_table(&conn)?;
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM faculty", [], |row| row.get(0))?;
            usize::try_from(count).map_err(|e| StorageError::Other(e.to_string()))
        })
        .await
    }
}
