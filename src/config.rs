use std::time::Duration;

use super::error::{Result, XbrlError};
use super::warning::WarningPolicy;

#[cfg(feature = "sqlite")]
use super::export::views::{SqliteView, default_views};

pub const DEFAULT_ENTRY_POINT_URL: &str = "https://filings.xbrl.org/api/filings";

/// Configuration for the filings client
#[derive(Debug, Clone)]
pub struct XbrlConfig {
    /// URL of the filings endpoint, also the base for relative URLs in responses
    pub entry_point_url: String,
    /// User agent string for HTTP requests
    pub user_agent: String,
    /// Rate limit in requests per second
    pub rate_limit: u32,
    /// HTTP request timeout
    pub timeout: Duration,
    /// Largest page size the API accepts
    pub max_page_size: usize,
    /// Start (inclusive) and stop (exclusive) of a year date filter as
    /// `(year offset, month)` pairs
    pub year_filter_months: YearFilterMonths,
    /// Render datetimes in UTC instead of the local offset
    pub utc_time: bool,
    /// Precision of datetimes written to SQLite
    pub time_accuracy: TimeAccuracy,
    /// Views created in SQLite exports
    #[cfg(feature = "sqlite")]
    pub views: Vec<SqliteView>,
    pub warning_policy: WarningPolicy,
}

/// Month window used when a date filter is given a bare year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearFilterMonths {
    pub start: (i32, u32),
    pub stop: (i32, u32),
}

impl Default for YearFilterMonths {
    fn default() -> Self {
        Self {
            start: (0, 8),
            stop: (1, 8),
        }
    }
}

impl YearFilterMonths {
    pub fn validate(&self) -> Result<()> {
        for (_, month) in [self.start, self.stop] {
            if !(1..=12).contains(&month) {
                return Err(XbrlError::ConfigError(format!(
                    "Year filter month must be between 1 and 12, got {month}"
                )));
            }
        }
        if self.stop <= self.start {
            return Err(XbrlError::ConfigError(
                "Year filter stop must be after start".to_string(),
            ));
        }
        Ok(())
    }
}

/// Text precision of datetimes in SQLite output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeAccuracy {
    Day,
    #[default]
    Min,
    Sec,
    Max,
}

impl TimeAccuracy {
    pub fn format_str(&self) -> &'static str {
        match self {
            TimeAccuracy::Day => "%Y-%m-%d",
            TimeAccuracy::Min => "%Y-%m-%d %H:%M",
            TimeAccuracy::Sec => "%Y-%m-%d %H:%M:%S",
            TimeAccuracy::Max => "%Y-%m-%d %H:%M:%S%.6f",
        }
    }
}

impl Default for XbrlConfig {
    fn default() -> Self {
        Self {
            entry_point_url: DEFAULT_ENTRY_POINT_URL.to_string(),
            user_agent: format!("xbrlkit/{}", env!("CARGO_PKG_VERSION")),
            rate_limit: 5,
            timeout: Duration::from_secs(30),
            max_page_size: 200,
            year_filter_months: YearFilterMonths::default(),
            utc_time: false,
            time_accuracy: TimeAccuracy::default(),
            #[cfg(feature = "sqlite")]
            views: default_views(),
            warning_policy: WarningPolicy::default(),
        }
    }
}

impl XbrlConfig {
    /// Creates a new XbrlConfig with custom connection settings
    ///
    /// # Basic usage
    ///
    /// ```ignore
    /// use xbrlkit::{Xbrl, XbrlConfig};
    /// use std::time::Duration;
    /// let config = XbrlConfig::new("YourAppName contact@example.com", 5, Duration::from_secs(30))
    ///     .with_utc_time(true);
    /// let xbrl = Xbrl::with_config(config)?;
    /// ```
    pub fn new(user_agent: impl Into<String>, rate_limit: u32, timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.into(),
            rate_limit,
            timeout,
            ..Self::default()
        }
    }

    pub fn with_entry_point_url(mut self, url: impl Into<String>) -> Self {
        self.entry_point_url = url.into();
        self
    }

    pub fn with_max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = size;
        self
    }

    pub fn with_year_filter_months(mut self, start: (i32, u32), stop: (i32, u32)) -> Self {
        self.year_filter_months = YearFilterMonths { start, stop };
        self
    }

    pub fn with_utc_time(mut self, utc_time: bool) -> Self {
        self.utc_time = utc_time;
        self
    }

    pub fn with_time_accuracy(mut self, accuracy: TimeAccuracy) -> Self {
        self.time_accuracy = accuracy;
        self
    }

    #[cfg(feature = "sqlite")]
    pub fn with_views(mut self, views: Vec<SqliteView>) -> Self {
        self.views = views;
        self
    }

    pub fn with_warning_policy(mut self, policy: WarningPolicy) -> Self {
        self.warning_policy = policy;
        self
    }
}
