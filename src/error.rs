use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use super::warning::ApiWarning;

#[derive(Error, Debug)]
pub enum XbrlError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("{0}")]
    Api(ApiErrorGroup),

    #[error("HTTP status {status} {reason}: {body}")]
    HttpStatus {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid filter value {value:?} for field {field:?}")]
    InvalidFilter { field: String, value: String },

    #[error("Only filings can be stored in a filing set, got {0}")]
    NotAFiling(String),

    #[error("Filing not found: {0}")]
    NotFound(String),

    #[error("Field reader for {0} was closed without any reads")]
    ReaderNotUsed(String),

    #[error("Warning escalated to error: {0}")]
    Warning(ApiWarning),

    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Database file already exists: {}", .0.display())]
    DatabaseFileExists(PathBuf),

    #[error("Database path is reserved by a non-file object: {}", .0.display())]
    DatabasePathReserved(PathBuf),

    #[error("Existing database schema does not match: {}", .0.display())]
    SchemaUnmatch(PathBuf),

    #[error("View name defined more than once: {0}")]
    DuplicateView(String),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// A single error object from an `errors` array of the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub title: Option<String>,
    pub detail: Option<String>,
    pub code: Option<String>,
    /// The `status` member of the error object itself.
    pub api_status: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = self.title.as_deref().unwrap_or("Unknown error");
        match &self.detail {
            Some(detail) => write!(f, "{title}: {detail}"),
            None => f.write_str(title),
        }
    }
}

/// All structured errors returned by one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiErrorGroup {
    pub errors: Vec<ApiError>,
    /// HTTP status code of the response.
    pub status: u16,
    /// HTTP reason phrase of the response.
    pub status_text: String,
}

impl fmt::Display for ApiErrorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "API returned {} error(s) with HTTP {} {}",
            self.errors.len(),
            self.status,
            self.status_text
        )?;
        for error in &self.errors {
            write!(f, "; {error}")?;
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, XbrlError>;
