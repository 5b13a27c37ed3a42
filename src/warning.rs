use serde::Serialize;
use std::fmt;

/// Category of a non-fatal condition found while parsing responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WarningKind {
    /// A referenced resource was not found, or a reference was not declared.
    Reference,
    /// The same filing id was returned more than once within one query.
    IdCoherence,
    /// A date, datetime or URL string could not be coerced.
    StringParse,
    /// A value derived from message text could not be parsed.
    DerivedValue,
    /// A resource of an unknown type was encountered.
    UnexpectedResourceType,
}

/// A non-fatal condition. Processing continues after one is raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiWarning {
    pub kind: WarningKind,
    pub message: String,
    /// Filing being parsed or linked when the warning was raised.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filing_api_id: Option<String>,
}

impl ApiWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::warn!(kind = ?kind, "{}", message);
        Self {
            kind,
            message,
            filing_api_id: None,
        }
    }

    pub(crate) fn for_filing(mut self, api_id: &str) -> Self {
        self.filing_api_id = Some(api_id.to_string());
        self
    }
}

impl fmt::Display for ApiWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// What the query functions do with the warnings of a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WarningPolicy {
    /// Log and collect warnings, keep going.
    #[default]
    Log,
    /// Fail the query on the first warning.
    Error,
}
