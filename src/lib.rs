//! # xbrlkit - A Rust client for the filings.xbrl.org API
//!
//! xbrlkit queries the XBRL filing repository at
//! [filings.xbrl.org](https://filings.xbrl.org) through its JSON:API and
//! reconciles the paginated responses into linked records: filings, the
//! entities that filed them and the validation messages of each filing.
//!
//! ## Features
//!
//! - **Query planning** - Multi-value and year filters are expanded into
//!   separate requests and paginated up to an exact result size cap
//! - **Linked records** - Filings reference their entity and validation
//!   messages, and entities and messages refer back to their filings
//! - **Filing sets** - Set algebra over filings with copy semantics
//! - **Export** - Column data for data frames and SQLite databases with views
//! - **Diagnostics** - Key path statistics reveal fields the API added
//!
//! ## Basic Usage
//!
//! ```ignore
//! use xbrlkit::{FilingQuery, FilingsOperations, ScopeFlags, Xbrl};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let xbrl = Xbrl::new("YourAppName contact@example.com")?;
//!
//!     let query = FilingQuery::new()
//!         .filter("country", vec!["FI", "SE"])
//!         .filter("last_end_date", 2023)
//!         .sort(["-added_time"])
//!         .flags(ScopeFlags::GET_ENTITY | ScopeFlags::GET_VALIDATION_MESSAGES);
//!
//!     let filings = xbrl.get_filings(&query).await?;
//!     for filing in &filings {
//!         println!("{filing}");
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod entity;
mod error;
pub mod export;
mod filing;
mod filing_set;
mod filings;
mod options;
mod page;
mod pager;
pub mod parsing;
mod query;
mod resource;
mod traits;
mod validation_message;
mod warning;

pub use config::{DEFAULT_ENTRY_POINT_URL, TimeAccuracy, XbrlConfig, YearFilterMonths};
pub use core::{HttpTransport, Transport, TransportResponse, Xbrl, api_request_count};
pub use entity::Entity;
pub use error::{ApiError, ApiErrorGroup, Result, XbrlError};
pub use export::columns::{ColumnOptions, DataColumns, DataValue};
#[cfg(feature = "sqlite")]
pub use export::views::{SqliteView, default_views};
pub use filing::Filing;
pub use filing_set::{EntityView, FilingSet, MessageView};
pub use options::{FilingQuery, FilterValue, ScopeFlags};
pub use page::{FilingsPage, PageLinks};
pub use pager::FilingsPager;
pub use parsing::json_tree::{
    KeyPathRetrieveCounts, key_path_availability_counts, reset_tracking, unaccessed_key_paths,
    unexpected_resource_types,
};
pub use query::{Params, RequestPlan, api_attribute_name, plan as plan_requests};
pub use resource::{AnyResource, RequestInfo, ResourceKind};
pub use traits::FilingsOperations;
pub use validation_message::{CALC_INCONSISTENCY_CODE, DUPLICATED_FACTS_CODE, ValidationMessage};
pub use warning::{ApiWarning, WarningKind, WarningPolicy};

/// Current crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
