//! Trait definitions of the query operations.
//!
//! The `Xbrl` client implements [`FilingsOperations`]. The trait exists so
//! code depending on the operations can be tested against another
//! implementation.

use super::error::Result;
use super::filing_set::FilingSet;
use super::options::FilingQuery;
use super::pager::FilingsPager;
use async_trait::async_trait;
#[cfg(feature = "sqlite")]
use std::path::Path;

/// Operations for querying filings of the XBRL repository.
///
/// All operations expand a [`FilingQuery`] into one or more API requests
/// and follow the pagination of each until the result size cap of the
/// query is reached.
#[async_trait]
pub trait FilingsOperations {
    /// Retrieves the filings of `query` into a set.
    async fn get_filings(&self, query: &FilingQuery) -> Result<FilingSet>;

    /// Prepares page by page retrieval of `query`. No request is made
    /// before the first page is fetched.
    fn filing_page_iter(&self, query: &FilingQuery) -> Result<FilingsPager>;

    /// Retrieves the filings of `query` into an SQLite database, writing
    /// each page as it arrives.
    ///
    /// The path is checked before any request is made. With `update`, an
    /// existing database is extended instead of refused.
    #[cfg(feature = "sqlite")]
    async fn to_sqlite(&self, query: &FilingQuery, path: &Path, update: bool) -> Result<()>;
}
