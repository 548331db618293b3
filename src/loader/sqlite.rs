//! SQLite backend for [`super::BatchLoader`] (feature `sqlite`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue};
use rusqlite::{Connection, params_from_iter};

use crate::error::IngestionResult;
use crate::record::Record;
use crate::types::{DataSet, DataType, Schema, Value};

use super::{BulkConnection, BulkTarget};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A SQLite database file. Every [`BulkTarget::connect`] opens a new connection.
#[derive(Debug, Clone)]
pub struct SqliteTarget {
    path: PathBuf,
}

impl SqliteTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create `table` for records of type `T` unless it already exists.
    pub fn create_table<T: Record>(&self, table: &str) -> IngestionResult<()> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(&create_table_sql(table, &T::schema()))?;
        Ok(())
    }
}

impl BulkTarget for SqliteTarget {
    type Connection = SqliteConnection;

    fn connect(&self) -> IngestionResult<SqliteConnection> {
        SqliteConnection::open(&self.path)
    }
}

/// One open SQLite connection with explicit transaction control.
#[derive(Debug)]
pub struct SqliteConnection {
    conn: Connection,
}

impl SqliteConnection {
    pub fn open(path: impl AsRef<Path>) -> IngestionResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Borrow the underlying connection (e.g. to run queries after a load).
    pub fn inner(&self) -> &Connection {
        &self.conn
    }
}

impl BulkConnection for SqliteConnection {
    fn begin(&mut self) -> IngestionResult<()> {
        // IMMEDIATE takes the write lock up front so concurrent loaders wait on busy_timeout.
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn write(&mut self, table: &str, chunk: &DataSet) -> IngestionResult<()> {
        let sql = insert_sql(table, &chunk.schema);
        let mut stmt = self.conn.prepare_cached(&sql)?;
        for row in &chunk.rows {
            stmt.execute(params_from_iter(row.iter()))?;
        }
        Ok(())
    }

    fn commit(&mut self) -> IngestionResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> IngestionResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Int64(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            Value::Float64(v) => ToSqlOutput::Owned(SqlValue::Real(*v)),
            Value::Bool(v) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*v))),
            Value::Utf8(s) => ToSqlOutput::from(s.as_str()),
            Value::Date(d) => ToSqlOutput::Owned(SqlValue::Text(d.format("%Y-%m-%d").to_string())),
            Value::DateTime(ts) => {
                ToSqlOutput::Owned(SqlValue::Text(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()))
            }
        })
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Int64 | DataType::Bool => "INTEGER",
        DataType::Float64 => "REAL",
        DataType::Utf8 | DataType::Date | DataType::DateTime => "TEXT",
    }
}

/// `CREATE TABLE IF NOT EXISTS` for a schema; column types follow the underlying field type.
pub fn create_table_sql(table: &str, schema: &Schema) -> String {
    let columns = schema
        .fields
        .iter()
        .map(|f| {
            let null = if f.nullable { "" } else { " NOT NULL" };
            format!("{} {}{}", quote_ident(f.column_name()), sql_type(f.data_type), null)
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({})", quote_ident(table), columns)
}

fn insert_sql(table: &str, schema: &Schema) -> String {
    let columns = schema
        .column_names()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ");
    let params = (1..=schema.fields.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {} ({}) VALUES ({})", quote_ident(table), columns, params)
}
