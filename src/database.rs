//! Row-existence checks against the application's database.

use crate::errors::{EmulatorError, Result};
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// The one query shape the emulator needs from a database.
pub trait DatabaseAdapter: Send + Sync {
    /// Number of rows in `table` whose columns equal every entry of `fields`.
    fn row_count(&self, table: &str, fields: &Map<String, Value>) -> Result<u64>;
}

/// SQLite-backed adapter.
#[derive(Clone)]
pub struct SqliteAdapter {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAdapter {
    /// Open an existing database file. A missing file is a configuration error, never created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(path, flags).map_err(|e| {
            EmulatorError::Configuration(format!(
                "Could not open the database at {}: {}",
                path.display(),
                e
            ))
        })?;
        debug!("Opened database at {:?}", path);
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Build the count query and its bound parameters.
    fn count_query(table: &str, fields: &Map<String, Value>) -> (String, Vec<SqlValue>) {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        for (column, value) in fields {
            let column = quote_identifier(column);
            match to_sql(value) {
                SqlValue::Null => clauses.push(format!("{} IS NULL", column)),
                sql => {
                    params.push(sql);
                    clauses.push(format!("{} = ?{}", column, params.len()));
                }
            }
        }

        let mut sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        (sql, params)
    }
}

impl DatabaseAdapter for SqliteAdapter {
    fn row_count(&self, table: &str, fields: &Map<String, Value>) -> Result<u64> {
        let (sql, params) = Self::count_query(table, fields);
        debug!("{}", sql);

        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(&sql, rusqlite::params_from_iter(params), |row| row.get(0))
            .map_err(|e| EmulatorError::Database(e.to_string()))?;

        Ok(count.max(0) as u64)
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}
