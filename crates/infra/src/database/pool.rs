//! The SQLite connection pool. Grounded on the teacher's `DbManager`
//! pattern, minus the SQLCipher encryption layer — spec.md has no
//! encryption-at-rest requirement (noted in DESIGN.md).

use std::path::{Path, PathBuf};

use forgesheet_domain::{Result, SyncError};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::info;

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

pub type SqlitePool = Pool<SqliteConnectionManager>;

/// Opens (creating if needed) the SQLite database at `db_path`, applies the
/// schema, and returns a ready-to-use pool. WAL mode and foreign keys are
/// turned on for every connection the pool hands out.
pub fn open_pool<P: AsRef<Path>>(db_path: P, max_size: u32) -> Result<SqlitePool> {
    let path: PathBuf = db_path.as_ref().to_path_buf();
    let manager = SqliteConnectionManager::file(&path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = Pool::builder()
        .max_size(max_size.max(1))
        .build(manager)
        .map_err(|err| SyncError::Database(format!("failed to build sqlite pool: {err}")))?;

    {
        let conn = pool.get().map_err(|err| SyncError::Database(err.to_string()))?;
        conn.execute_batch(SCHEMA_SQL).map_err(|err| SyncError::Database(err.to_string()))?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) \
             VALUES (?1, CAST(strftime('%s','now') AS INTEGER))",
            params![SCHEMA_VERSION],
        )
        .map_err(|err| SyncError::Database(err.to_string()))?;
    }

    info!(db_path = %path.display(), max_size, "sqlite pool initialised");
    Ok(pool)
}
