//! Filing queries of the `Xbrl` client.
//!
//! # Examples
//!
//! ```ignore
//! use xbrlkit::{FilingQuery, FilingsOperations, ScopeFlags, Xbrl};
//!
//! let xbrl = Xbrl::new("my_app/1.0 (my@email.com)")?;
//! let query = FilingQuery::new()
//!     .filter("country", "FI")
//!     .sort(["-added_time"])
//!     .max_size(Some(10))
//!     .flags(ScopeFlags::GET_ENTITY);
//! let filings = xbrl.get_filings(&query).await?;
//! for filing in &filings {
//!     println!("{filing}");
//! }
//! ```

use async_trait::async_trait;
#[cfg(feature = "sqlite")]
use std::path::Path;

use super::core::Xbrl;
use super::error::Result;
use super::filing_set::FilingSet;
use super::options::FilingQuery;
use super::pager::FilingsPager;
use super::traits::FilingsOperations;

#[cfg(feature = "sqlite")]
use super::export::sqlite::{SqliteExport, validate_path};

#[async_trait]
impl FilingsOperations for Xbrl {
    /// Retrieves the filings of `query` into a set.
    ///
    /// Pages are merged into the set as they arrive. The filings in the set
    /// are the objects parsed from the responses, linked to their entities
    /// and validation messages if `query.flags` requested them.
    ///
    /// # Errors
    ///
    /// * `XbrlError::ConfigError` - inconsistent date filter window
    /// * `XbrlError::InvalidFilter` - malformed date filter value
    /// * `XbrlError::Api` - the API returned structured errors
    /// * `XbrlError::HttpStatus` - non-200 response without structured errors
    /// * `XbrlError::Warning` - a warning with `WarningPolicy::Error`
    async fn get_filings(&self, query: &FilingQuery) -> Result<FilingSet> {
        let mut pager = self.filing_page_iter(query)?;
        let mut filings = FilingSet::new();
        while let Some(page) = pager.next_page().await? {
            filings.extend(page.filing_list);
        }
        Ok(filings)
    }

    fn filing_page_iter(&self, query: &FilingQuery) -> Result<FilingsPager> {
        FilingsPager::new(self.clone(), query)
    }

    /// Retrieves the filings of `query` into an SQLite database.
    ///
    /// # Errors
    ///
    /// The errors of [`FilingsOperations::get_filings`] and the database
    /// errors of the export, e.g. `XbrlError::DatabaseFileExists` if the
    /// file exists and `update` is not set.
    #[cfg(feature = "sqlite")]
    async fn to_sqlite(&self, query: &FilingQuery, path: &Path, update: bool) -> Result<()> {
        validate_path(path, update)?;
        let mut pager = self.filing_page_iter(query)?;
        let mut export: Option<SqliteExport> = None;
        while let Some(page) = pager.next_page().await? {
            if export.is_none() {
                export = Some(SqliteExport::open(path, update, query.flags, self.config())?);
            }
            if let Some(db) = export.as_mut() {
                db.write_page(&page)?;
            }
        }
        if export.is_none() {
            // no filings, still leave a database with the schema
            SqliteExport::open(path, update, query.flags, self.config())?;
        }
        Ok(())
    }
}
