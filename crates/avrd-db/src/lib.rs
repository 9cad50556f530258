//! SQLite layer for the AVRD control plane.
//!
//! Provides connection pooling via `r2d2`, WAL-mode initialization, and
//! embedded SQL migrations. Every table the control plane touches is created
//! through the versioned migrations in `src/migrations/`.
//!
//! SQLite fits the access pattern here: the control plane is a single
//! process, writes are short transactions, and WAL mode keeps readers
//! unblocked while one writer mutates. Migrations are compiled into the
//! binary with `include_str!` so they cannot drift from the code that
//! depends on them.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

/// A pooled SQLite handle shared by the stores.
pub type DbPool = Pool<SqliteConnectionManager>;

/// One checked-out connection from the pool.
pub type DbConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// Runtime tunables for SQLite connection behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbSettings {
    /// Busy timeout applied to every connection, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Maximum number of pooled connections.
    pub pool_max_size: u32,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

/// Errors from pool creation or migration execution.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to build the connection pool.
    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),

    /// A migration failed to execute.
    #[error("migration '{name}' failed: {source}")]
    Migration {
        name: &'static str,
        source: rusqlite::Error,
    },

    /// Failed to query or record migration state.
    #[error("failed to track migration state: {0}")]
    MigrationState(rusqlite::Error),
}

/// Creates a SQLite pool with WAL mode, foreign keys, and a busy timeout.
///
/// Pass `:memory:` as the path for an in-memory database in tests.
pub fn create_pool(db_path: &str, settings: DbSettings) -> Result<DbPool, DbError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

    let busy_timeout_ms = settings.busy_timeout_ms;
    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(flags)
        .with_init(move |conn| {
            // In-memory databases report "memory" instead of "wal"; both are
            // acceptable.
            let journal_mode: String =
                conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
            if journal_mode != "wal" && journal_mode != "memory" {
                return Err(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                    Some(format!("unexpected journal mode: {journal_mode}")),
                ));
            }
            conn.execute_batch(&format!(
                "PRAGMA foreign_keys = ON;\n PRAGMA busy_timeout = {busy_timeout_ms};"
            ))
        });

    let pool = Pool::builder().max_size(settings.pool_max_size).build(manager)?;
    Ok(pool)
}

struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. New migrations are appended here.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_init",
        sql: include_str!("migrations/000_init.sql"),
    },
    Migration {
        name: "001_endpoints",
        sql: include_str!("migrations/001_endpoints.sql"),
    },
];

/// Runs all pending migrations, returning how many were applied.
///
/// Applied migrations are tracked in `_avrd_migrations` and skipped on the
/// next run, so calling this on every startup is safe.
pub fn run_migrations(conn: &Connection) -> Result<usize, DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _avrd_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(DbError::MigrationState)?;

    let mut applied = 0;
    for migration in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM _avrd_migrations WHERE name = ?1)",
                [migration.name],
                |row| row.get(0),
            )
            .map_err(DbError::MigrationState)?;
        if already {
            continue;
        }

        conn.execute_batch(migration.sql)
            .map_err(|source| DbError::Migration {
                name: migration.name,
                source,
            })?;
        conn.execute(
            "INSERT INTO _avrd_migrations (name) VALUES (?1)",
            [migration.name],
        )
        .map_err(DbError::MigrationState)?;

        tracing::debug!(name = migration.name, "applied migration");
        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_applies_pragmas() {
        let settings = DbSettings {
            busy_timeout_ms: 2_500,
            pool_max_size: 3,
        };
        let pool = create_pool(":memory:", settings).unwrap();
        let conn = pool.get().unwrap();

        let fk: i32 = conn
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);

        let busy: i32 = conn
            .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(busy, 2_500);
        assert_eq!(pool.max_size(), 3);
    }

    #[test]
    fn migrations_run_once() {
        let pool = create_pool(":memory:", DbSettings::default()).unwrap();
        let conn = pool.get().unwrap();

        let applied = run_migrations(&conn).unwrap();
        assert_eq!(applied, MIGRATIONS.len());

        // Second run is a no-op.
        assert_eq!(run_migrations(&conn).unwrap(), 0);

        // The schema is usable afterwards.
        conn.execute(
            "INSERT INTO providers (id, name, type) VALUES ('p1', 'deepgram', 'ASR')",
            [],
        )
        .unwrap();
    }
}
