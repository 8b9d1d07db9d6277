//! Schema reconciliation for the feed item table.
//!
//! Before every write the live table is compared against the canonical
//! column set. A missing table is created; a table lacking any canonical
//! column is dropped and recreated, discarding its rows. Extra columns are
//! reported but left alone.

use std::fmt;

use tracing::{debug, info, warn};

use super::schema::{create_table_sql, drop_table_sql, ColumnDef, RSS_ITEMS_COLUMNS, RSS_ITEMS_TABLE};
use super::Database;
use crate::{IngestError, Result};

/// Column-level difference between the canonical schema and a live table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    /// Canonical columns absent from the live table.
    pub missing: Vec<String>,
    /// Live columns that are not part of the canonical schema.
    pub extra: Vec<String>,
}

impl SchemaDiff {
    /// True when every canonical column is present.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Compare expected columns with the names found in the catalog.
///
/// Names are compared case-insensitively. Both lists keep their input order.
pub fn diff_columns(expected: &[ColumnDef], actual: &[String]) -> SchemaDiff {
    let missing = expected
        .iter()
        .filter(|column| !actual.iter().any(|name| name.eq_ignore_ascii_case(column.name)))
        .map(|column| column.name.to_string())
        .collect();

    let extra = actual
        .iter()
        .filter(|name| !expected.iter().any(|column| column.name.eq_ignore_ascii_case(name)))
        .cloned()
        .collect();

    SchemaDiff { missing, extra }
}

/// What reconciliation did to the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The table did not exist and was created.
    Created,
    /// The table lacked canonical columns and was dropped and recreated.
    Recreated { missing: Vec<String> },
    /// The table already had every canonical column.
    Unchanged { extra: Vec<String> },
}

impl ReconcileOutcome {
    /// True when the table was created or rebuilt.
    pub fn changed_structure(&self) -> bool {
        !matches!(self, ReconcileOutcome::Unchanged { .. })
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileOutcome::Created => write!(f, "table created"),
            ReconcileOutcome::Recreated { missing } => {
                write!(f, "table recreated (missing: {})", missing.join(", "))
            }
            ReconcileOutcome::Unchanged { extra } if extra.is_empty() => {
                write!(f, "schema up to date")
            }
            ReconcileOutcome::Unchanged { extra } => {
                write!(f, "schema up to date (extra: {})", extra.join(", "))
            }
        }
    }
}

/// Verifies and repairs a table against its canonical column set.
pub struct SchemaReconciler<'a> {
    db: &'a Database,
    table: &'a str,
    columns: &'a [ColumnDef],
}

impl<'a> SchemaReconciler<'a> {
    /// Reconciler for the `rss_items` table.
    pub fn new(db: &'a Database) -> Self {
        Self::for_table(db, RSS_ITEMS_TABLE, RSS_ITEMS_COLUMNS)
    }

    /// Reconciler for an arbitrary table and column set.
    pub fn for_table(db: &'a Database, table: &'a str, columns: &'a [ColumnDef]) -> Self {
        Self { db, table, columns }
    }

    /// Diff the live table against the canonical columns.
    ///
    /// Returns `None` when the table does not exist.
    pub async fn diff(&self) -> Result<Option<SchemaDiff>> {
        let exists = self
            .db
            .table_exists(self.table)
            .await
            .map_err(|e| IngestError::Schema(format!("cannot look up table {}: {e}", self.table)))?;
        if !exists {
            return Ok(None);
        }

        let actual = self.db.column_names(self.table).await.map_err(|e| {
            IngestError::Schema(format!("cannot list columns of {}: {e}", self.table))
        })?;
        Ok(Some(diff_columns(self.columns, &actual)))
    }

    /// Bring the table in line with the canonical schema.
    ///
    /// Repeated calls against a correct table are no-ops.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome> {
        let outcome = match self.diff().await? {
            None => {
                info!("Table {} does not exist, creating it", self.table);
                self.create().await?;
                ReconcileOutcome::Created
            }
            Some(diff) if !diff.is_complete() => {
                warn!(
                    "Table {} is missing column(s) {}; dropping and recreating it, existing rows are discarded",
                    self.table,
                    diff.missing.join(", ")
                );
                self.recreate().await?;
                ReconcileOutcome::Recreated {
                    missing: diff.missing,
                }
            }
            Some(diff) => {
                if !diff.extra.is_empty() {
                    debug!(
                        "Table {} has extra column(s) {}",
                        self.table,
                        diff.extra.join(", ")
                    );
                }
                ReconcileOutcome::Unchanged { extra: diff.extra }
            }
        };

        debug!("Schema check for {}: {}", self.table, outcome);
        Ok(outcome)
    }

    async fn create(&self) -> Result<()> {
        sqlx::query(&create_table_sql(self.table, self.columns))
            .execute(self.db.pool())
            .await
            .map_err(|e| IngestError::Schema(format!("cannot create {}: {e}", self.table)))?;
        Ok(())
    }

    async fn recreate(&self) -> Result<()> {
        let schema_err = |e: sqlx::Error| {
            IngestError::Schema(format!("cannot recreate {}: {e}", self.table))
        };

        let mut tx = self.db.pool().begin().await.map_err(schema_err)?;
        sqlx::query(&drop_table_sql(self.table))
            .execute(&mut *tx)
            .await
            .map_err(schema_err)?;
        sqlx::query(&create_table_sql(self.table, self.columns))
            .execute(&mut *tx)
            .await
            .map_err(schema_err)?;
        tx.commit().await.map_err(schema_err)?;
        Ok(())
    }
}
