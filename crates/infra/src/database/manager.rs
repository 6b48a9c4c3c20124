//! Database connection manager backed by a shared r2d2 SQLite pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use revline_domain::{Result, RevlineError};
use rusqlite::params;
use tracing::info;

use crate::errors::InfraError;

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Shared SQLite connection pool.
pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

/// Pooled connection handle.
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Database manager that wraps an r2d2 [`DbPool`].
pub struct DbManager {
    pool: Arc<DbPool>,
    path: PathBuf,
}

impl DbManager {
    /// Create a new manager with the given pool size.
    pub fn new<P: AsRef<Path>>(db_path: P, pool_size: u32) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();

        let manager = SqliteConnectionManager::file(&path).with_init(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")
        });

        let pool = r2d2::Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(|e| RevlineError::Database(format!("failed to build pool: {e}")))?;

        info!(db_path = %path.display(), max_connections = pool.max_size(), "sqlite pool initialised");

        Ok(Self { pool: Arc::new(pool), path })
    }

    /// Borrow the underlying pool.
    pub fn pool(&self) -> Arc<DbPool> {
        Arc::clone(&self.pool)
    }

    /// Acquire a connection from the pool.
    pub fn get_connection(&self) -> Result<DbConnection> {
        self.pool.get().map_err(InfraError::from).map_err(RevlineError::from)
    }

    /// Ensure the full schema exists on the current database.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute_batch(SCHEMA_SQL).map_err(InfraError::from)?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, CAST(strftime('%s','now') AS INTEGER))",
            params![SCHEMA_VERSION],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verify database connectivity with a trivial query.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", params![], |row| row.get::<_, i32>(0))
            .map_err(InfraError::from)?;
        Ok(())
    }
}
