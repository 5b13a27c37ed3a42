//! Export of filings and their side records into an SQLite database.
//!
//! Each resource kind gets a table named after its class (`Filing`,
//! `Entity`, `ValidationMessage`) keyed by `api_id`. Rows are written with
//! `REPLACE INTO`, so exporting the same records again overwrites them.

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params_from_iter};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::columns::{DataRecord, DataValue, order_columns};
use super::views::SqliteView;
use crate::config::{TimeAccuracy, XbrlConfig};
use crate::entity::Entity;
use crate::error::{Result, XbrlError};
use crate::filing::Filing;
use crate::options::ScopeFlags;
use crate::page::FilingsPage;
use crate::validation_message::ValidationMessage;

/// Fails if `path` cannot be used for a new database, or for extending
/// an existing one when `update` is set.
pub(crate) fn validate_path(path: &Path, update: bool) -> Result<()> {
    if path.exists() {
        if !path.is_file() {
            return Err(XbrlError::DatabasePathReserved(path.to_path_buf()));
        }
        if !update {
            return Err(XbrlError::DatabaseFileExists(path.to_path_buf()));
        }
    }
    Ok(())
}

fn column_type(col: &str) -> &'static str {
    if col.ends_with("_count") {
        "INTEGER"
    } else if col.ends_with("_sum") || col.starts_with("duplicate_") {
        "REAL"
    } else {
        "TEXT"
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Table columns of record type `R` for `flags`.
fn table_columns<R: DataRecord>(flags: ScopeFlags) -> Vec<String> {
    order_columns(R::data_attributes())
        .into_iter()
        .filter(|col| {
            !(R::CLASS_NAME == Filing::KIND.class_name()
                && col == "entity_api_id"
                && !flags.entities())
        })
        .collect()
}

/// An open export database with its tables and views in place.
#[derive(Debug)]
pub struct SqliteExport {
    conn: Connection,
    flags: ScopeFlags,
    time_accuracy: TimeAccuracy,
    filing_columns: Vec<String>,
    entity_columns: Vec<String>,
    message_columns: Vec<String>,
}

impl SqliteExport {
    /// Opens or creates the database and prepares its schema.
    ///
    /// # Errors
    ///
    /// * `XbrlError::DatabaseFileExists` - the file exists and `update` is not set
    /// * `XbrlError::DatabasePathReserved` - the path is a directory or other non-file
    /// * `XbrlError::SchemaUnmatch` - `update` is set and the existing database
    ///   has none of the tables, or a table shares no columns with the export
    /// * `XbrlError::DuplicateView` - two views of the configuration share a name
    pub fn open(path: &Path, update: bool, flags: ScopeFlags, config: &XbrlConfig) -> Result<Self> {
        validate_path(path, update)?;
        check_view_names(&config.views)?;
        let existed = path.exists();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let export = Self {
            conn,
            flags,
            time_accuracy: config.time_accuracy,
            filing_columns: table_columns::<Filing>(flags),
            entity_columns: table_columns::<Entity>(flags),
            message_columns: table_columns::<ValidationMessage>(flags),
        };

        let tables = export.wanted_tables();
        if update && existed {
            export.extend_schema(path, &tables)?;
        }
        for (table, columns) in &tables {
            export.create_table(table, columns)?;
        }
        export.create_views(&config.views)?;
        Ok(export)
    }

    fn wanted_tables(&self) -> Vec<(&'static str, Vec<String>)> {
        let mut tables = vec![(Filing::KIND.class_name(), self.filing_columns.clone())];
        if self.flags.entities() {
            tables.push((Entity::KIND.class_name(), self.entity_columns.clone()));
        }
        if self.flags.validation_messages() {
            tables.push((
                ValidationMessage::KIND.class_name(),
                self.message_columns.clone(),
            ));
        }
        tables
    }

    fn schema_names(&self, kind: &str) -> Result<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_schema WHERE type = ?1")?;
        let names = stmt
            .query_map([kind], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(names)
    }

    fn existing_columns(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote(table)))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    fn extend_schema(&self, path: &Path, tables: &[(&'static str, Vec<String>)]) -> Result<()> {
        let existing = self.schema_names("table")?;
        let unmatch = || XbrlError::SchemaUnmatch(PathBuf::from(path));
        if !tables.iter().any(|(table, _)| existing.contains(*table)) {
            return Err(unmatch());
        }

        for (table, columns) in tables {
            if !existing.contains(*table) {
                continue;
            }
            let present = self.existing_columns(table)?;
            if !columns.iter().any(|c| present.contains(c)) {
                return Err(unmatch());
            }
            for column in columns.iter().filter(|c| !present.contains(c)) {
                let sql = format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    quote(table),
                    quote(column),
                    column_type(column)
                );
                tracing::debug!("{}", sql);
                self.conn.execute(&sql, [])?;
            }
        }
        Ok(())
    }

    fn create_table(&self, table: &str, columns: &[String]) -> Result<()> {
        let defs = columns
            .iter()
            .map(|col| {
                if col == "api_id" {
                    format!("{} TEXT PRIMARY KEY NOT NULL", quote(col))
                } else {
                    format!("{} {}", quote(col), column_type(col))
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({}) WITHOUT ROWID",
            quote(table),
            defs
        );
        tracing::debug!("{}", sql);
        self.conn.execute(&sql, [])?;
        Ok(())
    }

    fn create_views(&self, views: &[SqliteView]) -> Result<()> {
        let tables = self.schema_names("table")?;
        let existing_views = self.schema_names("view")?;
        for view in views {
            if existing_views.contains(&view.name) {
                continue;
            }
            if !view.required_tables.iter().all(|t| tables.contains(t)) {
                continue;
            }
            let sql = format!("CREATE VIEW {} AS {}", quote(&view.name), view.sql.trim());
            tracing::debug!("CREATE VIEW {}", view.name);
            self.conn.execute(&sql, [])?;
        }
        Ok(())
    }

    fn sql_value(&self, value: DataValue) -> SqlValue {
        let fmt = self.time_accuracy.format_str();
        match value {
            DataValue::Null => SqlValue::Null,
            DataValue::Text(s) => SqlValue::Text(s),
            DataValue::Integer(n) => SqlValue::Integer(n),
            DataValue::Real(x) => SqlValue::Real(x),
            DataValue::Date(d) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
            DataValue::DateTime(dt) => SqlValue::Text(dt.naive_local().format(fmt).to_string()),
            DataValue::NaiveDateTime(dt) => SqlValue::Text(dt.format(fmt).to_string()),
            DataValue::List(items) => SqlValue::Text(items.join("\n")),
        }
    }

    fn write_records<'a, R, I>(&mut self, columns: &[String], records: I) -> Result<usize>
    where
        R: DataRecord + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let sql = format!(
            "REPLACE INTO {} ({}) VALUES ({})",
            quote(R::CLASS_NAME),
            columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
            vec!["?"; columns.len()].join(", ")
        );
        let rows = records
            .into_iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|col| self.sql_value(record.data_value(col).unwrap_or(DataValue::Null)))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in &rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;
        tracing::debug!("{} ({} rows)", sql, rows.len());
        Ok(rows.len())
    }

    /// Writes filings and, if they were requested, their entities and
    /// validation messages.
    pub fn write_filings<'a, I>(&mut self, filings: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Arc<Filing>>,
    {
        let filings = filings.into_iter().collect::<Vec<_>>();
        let columns = self.filing_columns.clone();
        self.write_records::<Filing, _>(&columns, filings.iter().map(|f| Arc::as_ref(f)))?;

        if self.flags.entities() {
            let mut seen = HashSet::new();
            let entities = filings
                .iter()
                .filter_map(|f| f.entity())
                .filter(|e| seen.insert(e.api_id.clone()))
                .cloned()
                .collect::<Vec<_>>();
            let columns = self.entity_columns.clone();
            self.write_records::<Entity, _>(&columns, entities.iter().map(Arc::as_ref))?;
        }

        if self.flags.validation_messages() {
            let messages = filings
                .iter()
                .filter_map(|f| f.validation_messages())
                .flatten()
                .cloned()
                .collect::<Vec<_>>();
            let columns = self.message_columns.clone();
            self.write_records::<ValidationMessage, _>(
                &columns,
                messages.iter().map(Arc::as_ref),
            )?;
        }
        Ok(())
    }

    /// Writes the records of one page.
    pub fn write_page(&mut self, page: &FilingsPage) -> Result<()> {
        self.write_filings(&page.filing_list)
    }
}

fn check_view_names(views: &[SqliteView]) -> Result<()> {
    let mut names = HashSet::new();
    for view in views {
        if !names.insert(view.name.as_str()) {
            return Err(XbrlError::DuplicateView(view.name.clone()));
        }
    }
    Ok(())
}
