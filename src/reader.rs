// used for reading the result stores
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, error, warn};

use crate::datatype::Value;
use crate::error::Result;
use crate::sql::{RUN_ATTR_QUERY, RUN_PARAM_QUERY};
use crate::table::Table;
use crate::tags::{Tag, TagRegexMaps, TagService};

// ------------- Reader -------------
/// Runs queries against one result file.
///
/// A connection only lives for the duration of one query: `connect` and
/// `disconnect` bracket every read, so many readers running in parallel hold
/// at most one handle each, and only while they actually read.
#[derive(Debug, Clone)]
pub struct SqliteReader {
    db_file: String,
}

impl SqliteReader {
    pub fn new(db_file: impl Into<String>) -> Self {
        Self {
            db_file: db_file.into(),
        }
    }
    pub fn db_file(&self) -> &str {
        &self.db_file
    }
    /// Opens the file read-only. A missing file is an error, never an empty database.
    pub fn connect(&self) -> Result<Connection> {
        let connection = Connection::open_with_flags(
            &self.db_file,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(connection)
    }
    pub fn disconnect(&self, connection: Connection) {
        if let Err((_, e)) = connection.close() {
            warn!(file = %self.db_file, error = %e, "could not close connection");
        }
    }
    /// Runs one query, propagating failures.
    pub fn try_execute(&self, query: &str) -> Result<Table> {
        let connection = self.connect()?;
        let result = read_table(&connection, query);
        self.disconnect(connection);
        result
    }
    /// Runs one query; any failure is logged and yields an empty table.
    pub fn execute(&self, query: &str) -> Table {
        match self.try_execute(query) {
            Ok(table) => {
                debug!(file = %self.db_file, rows = table.row_count(), "query complete");
                table
            }
            Err(e) => {
                error!(file = %self.db_file, error = %e, "no data could be extracted");
                Table::empty()
            }
        }
    }
    pub fn read_attributes(&self) -> Result<Table> {
        self.try_execute(RUN_ATTR_QUERY)
    }
    pub fn read_parameters(&self) -> Result<Table> {
        self.try_execute(RUN_PARAM_QUERY)
    }
    /// Hands the attribute and parameter readers to the tag service. Failures
    /// are logged and yield no tags.
    pub fn extract_tags(&self, service: &dyn TagService, maps: &TagRegexMaps) -> Vec<Tag> {
        let attributes = || self.read_attributes();
        let parameters = || self.read_parameters();
        match service.extract(&attributes, &parameters, maps) {
            Ok(tags) => tags,
            Err(e) => {
                error!(file = %self.db_file, error = %e, "no tags could be extracted");
                Vec::new()
            }
        }
    }
}

fn read_table(connection: &Connection, query: &str) -> Result<Table> {
    let mut statement = connection.prepare(query)?;
    let names: Vec<String> = statement
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
    let mut rows = statement.query([])?;
    while let Some(row) = rows.next()? {
        for (i, column) in columns.iter_mut().enumerate() {
            column.push(row.get::<_, Value>(i)?);
        }
    }
    Table::new(names.into_iter().zip(columns).collect())
}
