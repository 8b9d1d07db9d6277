//! Database module for rss2db.
//!
//! This module owns connection setup for the configured backend and the
//! catalog queries used to inspect the live schema. PostgreSQL is used when
//! the `postgres` feature is enabled; otherwise SQLite.

mod reconcile;
mod schema;

pub use reconcile::{diff_columns, ReconcileOutcome, SchemaDiff, SchemaReconciler};
pub use schema::{
    create_table_sql, drop_table_sql, ColumnDef, ColumnType, RSS_ITEMS_COLUMNS, RSS_ITEMS_TABLE,
};

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("enable either the `sqlite` or the `postgres` feature");

/// Connection pool for the active backend.
#[cfg(feature = "postgres")]
pub type DbPool = sqlx::PgPool;

/// Connection pool for the active backend.
#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
pub type DbPool = sqlx::SqlitePool;

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
use std::path::Path;

use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::{IngestError, Result};

/// Database handle wrapping a connection pool.
///
/// A handle is opened for one run and released with [`Database::close`].
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Connect to the PostgreSQL server described by `config`.
    #[cfg(feature = "postgres")]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

        info!(
            "Connecting to PostgreSQL at {}:{}/{}",
            config.host, config.port, config.name
        );

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.username)
            .password(&config.password);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| IngestError::DatabaseConnection(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Open the SQLite database file at `config.path`, creating it if needed.
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

        let path = Path::new(&config.path);
        info!("Opening database at {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| IngestError::DatabaseConnection(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Open an in-memory database for testing.
    ///
    /// The pool holds exactly one connection that never expires, since every
    /// new SQLite memory connection would start from an empty database.
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub async fn open_in_memory() -> Result<Self> {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::time::Duration;

        debug!("Opening in-memory database");
        let options: SqliteConnectOptions = "sqlite::memory:"
            .parse()
            .map_err(|e: sqlx::Error| IngestError::DatabaseConnection(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await
            .map_err(|e| IngestError::DatabaseConnection(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Name of the active backend.
    pub fn backend_name(&self) -> &'static str {
        if cfg!(feature = "postgres") {
            "postgres"
        } else {
            "sqlite"
        }
    }

    /// Close every connection in the pool.
    pub async fn close(self) {
        debug!("Closing {} database pool", self.backend_name());
        self.pool.close().await;
    }

    /// Check if a table exists in the current schema.
    #[cfg(feature = "postgres")]
    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
            )
            "#,
        )
        .bind(table_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists.0)
    }

    /// Check if a table exists.
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = $1)",
        )
        .bind(table_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists.0)
    }

    /// List the columns of a table in ordinal order.
    ///
    /// Returns an empty list when the table does not exist.
    #[cfg(feature = "postgres")]
    pub async fn column_names(&self, table_name: &str) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT column_name::TEXT
            FROM information_schema.columns
            WHERE table_schema = current_schema() AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(table_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    /// List the columns of a table in ordinal order.
    ///
    /// Returns an empty list when the table does not exist.
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub async fn column_names(&self, table_name: &str) -> Result<Vec<String>> {
        let names =
            sqlx::query_scalar::<_, String>("SELECT name FROM pragma_table_info($1) ORDER BY cid")
                .bind(table_name)
                .fetch_all(&self.pool)
                .await?;
        Ok(names)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("backend", &self.backend_name())
            .finish()
    }
}
