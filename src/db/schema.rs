//! Canonical schema of the `rss_items` table.
//!
//! The column list is the single source of truth for both table creation
//! and the column check performed before every write.

/// Name of the table feed items are stored in.
pub const RSS_ITEMS_TABLE: &str = "rss_items";

/// Column storage type, rendered per backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Auto-incrementing integer primary key.
    Serial,
    /// Length-bounded text.
    Varchar(u32),
    /// Unbounded text.
    Text,
    /// Timezone-aware timestamp.
    TimestampTz,
}

impl ColumnType {
    /// SQL type declaration for the active backend.
    #[cfg(feature = "postgres")]
    pub fn sql(&self) -> String {
        match self {
            ColumnType::Serial => "SERIAL PRIMARY KEY".to_string(),
            ColumnType::Varchar(len) => format!("VARCHAR({len})"),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::TimestampTz => "TIMESTAMPTZ".to_string(),
        }
    }

    /// SQL type declaration for the active backend.
    ///
    /// SQLite keeps timestamps as RFC 3339 text.
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub fn sql(&self) -> String {
        match self {
            ColumnType::Serial => "INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
            ColumnType::Varchar(len) => format!("VARCHAR({len})"),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::TimestampTz => "TEXT".to_string(),
        }
    }
}

/// A column of the canonical schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl ColumnDef {
    const fn new(name: &'static str, column_type: ColumnType, nullable: bool) -> Self {
        Self {
            name,
            column_type,
            nullable,
        }
    }

    /// Column definition as it appears inside `CREATE TABLE`.
    pub fn definition(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.column_type.sql());
        if !self.nullable && self.column_type != ColumnType::Serial {
            sql.push_str(" NOT NULL");
        }
        sql
    }
}

/// Canonical columns of `rss_items`, in creation order.
pub const RSS_ITEMS_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", ColumnType::Serial, false),
    ColumnDef::new("title", ColumnType::Varchar(500), false),
    ColumnDef::new("description", ColumnType::Text, true),
    ColumnDef::new("link", ColumnType::Varchar(1000), false),
    ColumnDef::new("pub_date", ColumnType::TimestampTz, false),
    ColumnDef::new("author", ColumnType::Varchar(200), true),
    ColumnDef::new("category", ColumnType::Varchar(100), true),
];

/// Build the `CREATE TABLE` statement for the given columns.
pub fn create_table_sql(table: &str, columns: &[ColumnDef]) -> String {
    let body = columns
        .iter()
        .map(|column| format!("    {}", column.definition()))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("CREATE TABLE {table} (\n{body}\n)")
}

/// Build the `DROP TABLE` statement for the given table.
pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {table}")
}
