//! SqliteSink - row store keyed by local timestamp and UTC epoch
//!
//! One table per channel group:
//!
//! ```sql
//! CREATE TABLE heizgeraet (LocalTimestamp TEXT, UTC INTEGER, <item> <type>, ...);
//! CREATE INDEX idx_heizgeraet_localtimestamp ON heizgeraet(LocalTimestamp);
//! ```
//!
//! Identifiers come from configuration and are validated and quoted; every
//! value is a bound parameter.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use contracts::{is_valid_identifier, ChannelConfig, ContractError, Scalar};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info, instrument, warn};

/// Local wall-clock format of the `LocalTimestamp` column
pub const LOCAL_TIMESTAMP_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

const LOCAL_COLUMN: &str = "LocalTimestamp";
const UTC_COLUMN: &str = "UTC";

/// Comparison operator of a conditional delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Ge => ">=",
            CompareOp::Gt => ">",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One persisted row
#[derive(Debug, Clone, PartialEq)]
pub struct RelationalRow {
    pub table: String,
    pub local_timestamp: String,
    pub utc: i64,
    pub values: Vec<Scalar>,
}

/// Format an instant the way `LocalTimestamp` stores it
pub fn local_timestamp(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&Local)
        .format(LOCAL_TIMESTAMP_FORMAT)
        .to_string()
}

/// SQLite sink
///
/// Disabled sinks accept every write as a successful no-op and answer every
/// read with an empty result. Enabled sinks that are not connected report
/// `SinkUnavailable` on each call.
pub struct SqliteSink {
    name: String,
    path: PathBuf,
    conn: Option<Connection>,
    enabled: bool,
}

impl SqliteSink {
    /// Create an enabled, not yet connected sink
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            name: "sqlite".to_string(),
            path: path.into(),
            conn: None,
            enabled: true,
        }
    }

    /// Create a sink that never touches storage
    pub fn disabled() -> Self {
        let mut sink = Self::new(PathBuf::new());
        sink.enabled = false;
        sink
    }

    /// Create and connect a file-backed sink
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ContractError> {
        let mut sink = Self::new(path);
        sink.connect()?;
        Ok(sink)
    }

    /// Create and connect an in-memory sink (for testing)
    pub fn open_in_memory() -> Result<Self, ContractError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ContractError::sink_connection("sqlite", e.to_string()))?;
        let mut sink = Self::new(":memory:");
        sink.conn = Some(conn);
        Ok(sink)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Sink-level kill switch
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Open the database connection (no-op if disabled or already connected)
    #[instrument(name = "sqlite_sink_connect", skip(self), fields(path = %self.path.display()))]
    pub fn connect(&mut self) -> Result<(), ContractError> {
        if !self.enabled || self.conn.is_some() {
            return Ok(());
        }
        let conn = Connection::open(&self.path)
            .map_err(|e| ContractError::sink_connection(&self.name, e.to_string()))?;
        debug!(sink = %self.name, "SQLite connected");
        self.conn = Some(conn);
        Ok(())
    }

    /// Commit pending work and release the connection
    #[instrument(name = "sqlite_sink_close", skip(self))]
    pub fn close(&mut self) -> Result<(), ContractError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")
                .map_err(|e| ContractError::query("*", e.to_string()))?;
        }
        conn.close()
            .map_err(|(_, e)| ContractError::sink_connection(&self.name, e.to_string()))?;
        debug!(sink = %self.name, "SQLite closed");
        Ok(())
    }

    /// Create tables, columns and indexes for every channel group
    ///
    /// Startup only. Idempotent: existing tables gain missing columns.
    #[instrument(name = "sqlite_sink_provision", skip(self, channels), fields(groups = channels.len()))]
    pub fn provision(&mut self, channels: &[ChannelConfig]) -> Result<(), ContractError> {
        let Some(conn) = self.writable()? else {
            return Ok(());
        };

        // must precede the first table to take effect
        conn.execute_batch("PRAGMA auto_vacuum = FULL")
            .map_err(|e| ContractError::query("*", e.to_string()))?;

        for channel in channels {
            let table = quote_ident(&channel.table)?;
            let err = query_err(&channel.table);

            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (\"{LOCAL_COLUMN}\" TEXT, \"{UTC_COLUMN}\" INTEGER)"
            ))
            .map_err(&err)?;

            let existing = column_names(conn, &channel.table).map_err(&err)?;
            for item in &channel.items {
                if existing.iter().any(|c| c.eq_ignore_ascii_case(&item.name)) {
                    continue;
                }
                conn.execute_batch(&format!(
                    "ALTER TABLE {table} ADD COLUMN {} {}",
                    quote_ident(&item.name)?,
                    item.datatype.sql_type()
                ))
                .map_err(&err)?;
                debug!(table = %channel.table, column = %item.name, "Column added");
            }

            let index = quote_ident(&format!(
                "idx_{}_{}",
                channel.table,
                LOCAL_COLUMN.to_lowercase()
            ))?;
            conn.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS {index} ON {table}(\"{LOCAL_COLUMN}\")"
            ))
            .map_err(&err)?;
        }

        info!(sink = %self.name, groups = channels.len(), "SQLite schema provisioned");
        Ok(())
    }

    /// Insert one row stamped with `timestamp`
    ///
    /// Opens a transaction if none is pending; `commit` ends it.
    pub fn insert(
        &mut self,
        table: &str,
        values: &[Scalar],
        timestamp: DateTime<Utc>,
    ) -> Result<(), ContractError> {
        let Some(conn) = self.writable()? else {
            return Ok(());
        };
        let quoted = quote_ident(table)?;
        let err = query_err(table);

        let mut params = Vec::with_capacity(values.len() + 2);
        params.push(Value::Text(local_timestamp(timestamp)));
        params.push(Value::Integer(timestamp.timestamp()));
        params.extend(values.iter().map(to_sql_value));

        let placeholders = (1..=params.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(",");

        if conn.is_autocommit() {
            conn.execute_batch("BEGIN").map_err(&err)?;
        }
        conn.execute(
            &format!("INSERT INTO {quoted} VALUES ({placeholders})"),
            params_from_iter(params.iter()),
        )
        .map_err(&err)?;
        Ok(())
    }

    /// Commit the pending transaction, if any
    pub fn commit(&mut self) -> Result<(), ContractError> {
        let Some(conn) = self.writable()? else {
            return Ok(());
        };
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")
                .map_err(|e| ContractError::query("*", e.to_string()))?;
        }
        Ok(())
    }

    /// Delete rows where `column <op> value`; returns the number deleted
    pub fn delete_where(
        &mut self,
        table: &str,
        column: &str,
        op: CompareOp,
        value: &Scalar,
    ) -> Result<usize, ContractError> {
        let Some(conn) = self.writable()? else {
            return Ok(0);
        };
        let sql = format!(
            "DELETE FROM {} WHERE {} {} ?1",
            quote_ident(table)?,
            quote_ident(column)?,
            op
        );
        conn.execute(&sql, [to_sql_value(value)])
            .map_err(query_err(table))
    }

    /// Delete rows with `UTC < utc_threshold`
    pub fn delete_older_than(
        &mut self,
        table: &str,
        utc_threshold: i64,
    ) -> Result<usize, ContractError> {
        self.delete_where(table, UTC_COLUMN, CompareOp::Lt, &Scalar::Int(utc_threshold))
    }

    /// Minimum `UTC` stored in `table`, `None` if the table is empty
    pub fn oldest_timestamp(&mut self, table: &str) -> Result<Option<i64>, ContractError> {
        let Some(conn) = self.writable()? else {
            return Ok(None);
        };
        let sql = format!(
            "SELECT MIN(\"{UTC_COLUMN}\") FROM {} WHERE \"{UTC_COLUMN}\" IS NOT NULL",
            quote_ident(table)?
        );
        conn.query_row(&sql, [], |row| row.get::<_, Option<i64>>(0))
            .map_err(query_err(table))
    }

    /// Reclaim storage; commits any pending transaction first
    pub fn vacuum(&mut self) -> Result<(), ContractError> {
        let Some(conn) = self.writable()? else {
            return Ok(());
        };
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")
                .map_err(|e| ContractError::query("*", e.to_string()))?;
        }
        conn.execute_batch("VACUUM")
            .map_err(|e| ContractError::query("*", e.to_string()))
    }

    /// Number of rows in `table`
    pub fn count_rows(&mut self, table: &str) -> Result<u64, ContractError> {
        let Some(conn) = self.writable()? else {
            return Ok(0);
        };
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table)?);
        conn.query_row(&sql, [], |row| row.get::<_, i64>(0))
            .map(|n| n.max(0) as u64)
            .map_err(query_err(table))
    }

    /// All rows of `table` ordered by `UTC`
    pub fn fetch_rows(&mut self, table: &str) -> Result<Vec<RelationalRow>, ContractError> {
        let Some(conn) = self.writable()? else {
            return Ok(Vec::new());
        };
        let err = query_err(table);
        let sql = format!(
            "SELECT * FROM {} ORDER BY \"{UTC_COLUMN}\" ASC",
            quote_ident(table)?
        );
        let mut stmt = conn.prepare(&sql).map_err(&err)?;
        let columns = stmt.column_count();

        let rows = stmt
            .query_map([], |row| {
                let mut values = Vec::with_capacity(columns.saturating_sub(2));
                for idx in 2..columns {
                    values.push(from_sql_value(row.get::<_, Value>(idx)?));
                }
                Ok(RelationalRow {
                    table: table.to_string(),
                    local_timestamp: row.get(0)?,
                    utc: row.get(1)?,
                    values,
                })
            })
            .map_err(&err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(&err)?;
        Ok(rows)
    }

    /// Connection to write through; `None` means disabled (no-op)
    fn writable(&mut self) -> Result<Option<&mut Connection>, ContractError> {
        if !self.enabled {
            return Ok(None);
        }
        match self.conn.as_mut() {
            Some(conn) => Ok(Some(conn)),
            None => {
                warn!(sink = %self.name, "SQLite used while not connected");
                Err(ContractError::sink_unavailable(&self.name))
            }
        }
    }
}

impl Drop for SqliteSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(sink = %self.name, error = %e, "SQLite close on drop failed");
        }
    }
}

fn quote_ident(name: &str) -> Result<String, ContractError> {
    if !is_valid_identifier(name) {
        return Err(ContractError::query(
            name,
            format!("'{name}' is not a valid identifier"),
        ));
    }
    Ok(format!("\"{name}\""))
}

fn query_err(table: &str) -> impl Fn(rusqlite::Error) -> ContractError + '_ {
    move |e| ContractError::query(table, e.to_string())
}

fn column_names(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let names = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

fn to_sql_value(value: &Scalar) -> Value {
    match value {
        Scalar::Int(v) => Value::Integer(*v),
        Scalar::Real(v) => Value::Real(*v),
        Scalar::Text(v) => Value::Text(v.clone()),
    }
}

fn from_sql_value(value: Value) -> Scalar {
    match value {
        Value::Integer(v) => Scalar::Int(v),
        Value::Real(v) => Scalar::Real(v),
        Value::Text(v) => Scalar::Text(v),
        Value::Null => Scalar::Text(String::new()),
        Value::Blob(b) => Scalar::Text(String::from_utf8_lossy(&b).into_owned()),
    }
}
