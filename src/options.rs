use bitflags::bitflags;
use chrono::NaiveDate;

bitflags! {
    /// Which resource kinds a query retrieves besides filings.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScopeFlags: u8 {
        /// Retrieve filings only. Overrides the other flags.
        const GET_ONLY_FILINGS = 1;
        /// Retrieve the entities of the filings.
        const GET_ENTITY = 1 << 1;
        /// Retrieve the validation messages of the filings.
        const GET_VALIDATION_MESSAGES = 1 << 2;
    }
}

impl Default for ScopeFlags {
    fn default() -> Self {
        ScopeFlags::GET_ONLY_FILINGS
    }
}

impl ScopeFlags {
    pub fn entities(self) -> bool {
        !self.contains(Self::GET_ONLY_FILINGS) && self.contains(Self::GET_ENTITY)
    }

    pub fn validation_messages(self) -> bool {
        !self.contains(Self::GET_ONLY_FILINGS) && self.contains(Self::GET_VALIDATION_MESSAGES)
    }

    /// Value of the `include` request parameter.
    pub fn include_param(self) -> Option<String> {
        let mut parts = Vec::new();
        if self.entities() {
            parts.push("entity");
        }
        if self.validation_messages() {
            parts.push("validation_messages");
        }
        (!parts.is_empty()).then(|| parts.join(","))
    }
}

/// Value of a query filter. A multi-value filter is requested once per value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Single(String),
    Multi(Vec<String>),
}

impl FilterValue {
    pub(crate) fn values(&self) -> Vec<String> {
        match self {
            FilterValue::Single(v) => vec![v.clone()],
            FilterValue::Multi(vs) => vs.clone(),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Single(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Single(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Single(value.to_string())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Single(value.to_string())
    }
}

impl From<NaiveDate> for FilterValue {
    fn from(value: NaiveDate) -> Self {
        FilterValue::Single(value.format("%Y-%m-%d").to_string())
    }
}

impl<T: ToString> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        FilterValue::Multi(values.iter().map(ToString::to_string).collect())
    }
}

impl<T: ToString, const N: usize> From<[T; N]> for FilterValue {
    fn from(values: [T; N]) -> Self {
        FilterValue::Multi(values.iter().map(ToString::to_string).collect())
    }
}

/// A query of filings.
///
/// Field names of filters and sort are attribute names of
/// [`Filing`](crate::Filing) such as `country` or `added_time`. Names the
/// client does not know are sent to the API as they are.
#[derive(Debug, Clone)]
pub struct FilingQuery {
    pub filters: Vec<(String, FilterValue)>,
    pub sort: Vec<String>,
    /// Maximum number of filings. `None` retrieves everything.
    pub max_size: Option<usize>,
    pub flags: ScopeFlags,
    pub api_params: Vec<(String, String)>,
}

impl Default for FilingQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: Vec::new(),
            max_size: Some(100),
            flags: ScopeFlags::default(),
            api_params: Vec::new(),
        }
    }
}

impl FilingQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.filters.iter_mut().find(|(f, _)| *f == field) {
            Some(existing) => existing.1 = value,
            None => self.filters.push((field, value)),
        }
        self
    }

    /// Sort fields. A leading `-` sorts in descending order.
    pub fn sort<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_size(mut self, max_size: Option<usize>) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn unlimited(self) -> Self {
        self.max_size(None)
    }

    pub fn flags(mut self, flags: ScopeFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Raw request parameter. Overrides parameters set by the client.
    pub fn add_api_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.api_params.push((name.into(), value.into()));
        self
    }
}
