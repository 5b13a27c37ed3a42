//! Dotted field path reader over JSON fragments with access tracking.
//!
//! Every resource is hydrated through a [`FieldPathReader`]. Each read is
//! counted per `(class name, key path)` in process-wide tables, and when a
//! reader is closed every leaf path of its fragment that has never been
//! read for that class is recorded as unaccessed. The unaccessed paths
//! reveal fields the API has started to return but this client does not
//! know about.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};
use url::Url;

use crate::config::{DEFAULT_ENTRY_POINT_URL, XbrlConfig};
use crate::error::{Result, XbrlError};
use crate::warning::{ApiWarning, WarningKind};

/// Retrieval statistics of one key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct KeyPathRetrieveCounts {
    pub class_name: String,
    pub key_path: String,
    /// Reads that produced a value.
    pub success_count: u64,
    /// All reads.
    pub total_count: u64,
}

#[derive(Debug, Default)]
struct TrackingState {
    counters: BTreeMap<String, BTreeMap<String, (u64, u64)>>,
    unaccessed: BTreeSet<(String, String)>,
    unexpected_types: BTreeSet<(String, String)>,
}

static TRACKING: LazyLock<Mutex<TrackingState>> =
    LazyLock::new(|| Mutex::new(TrackingState::default()));

fn tracking() -> MutexGuard<'static, TrackingState> {
    TRACKING.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Settings used for coercing string values.
#[derive(Debug, Clone)]
pub struct ParseSettings {
    pub base_url: Option<Url>,
    pub utc_time: bool,
}

impl ParseSettings {
    pub fn from_config(config: &XbrlConfig) -> Result<Self> {
        let base_url = Url::parse(&config.entry_point_url).map_err(|e| {
            XbrlError::ConfigError(format!(
                "Invalid entry point URL {}: {}",
                config.entry_point_url, e
            ))
        })?;
        Ok(Self {
            base_url: Some(base_url),
            utc_time: config.utc_time,
        })
    }
}

impl Default for ParseSettings {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_ENTRY_POINT_URL).ok(),
            utc_time: false,
        }
    }
}

/// Reads values from one JSON fragment by dotted key paths.
///
/// Values found at the end of a path may be coerced into dates,
/// datetimes or absolute URLs. A coercion failure does not fail the read:
/// a [`WarningKind::StringParse`] warning is stored and `None` returned.
///
/// The reader must be consumed with [`FieldPathReader::close`] after all
/// reads, which returns the collected warnings.
#[derive(Debug)]
pub struct FieldPathReader<'a> {
    class_name: &'static str,
    tree: &'a Value,
    settings: &'a ParseSettings,
    do_not_track: bool,
    reads: usize,
    warnings: Vec<ApiWarning>,
}

impl<'a> FieldPathReader<'a> {
    pub fn new(class_name: &'static str, tree: &'a Value, settings: &'a ParseSettings) -> Self {
        Self {
            class_name,
            tree,
            settings,
            do_not_track: false,
            reads: 0,
            warnings: Vec::new(),
        }
    }

    /// Reader which leaves the global statistics untouched.
    pub fn untracked(
        class_name: &'static str,
        tree: &'a Value,
        settings: &'a ParseSettings,
    ) -> Self {
        Self {
            do_not_track: true,
            ..Self::new(class_name, tree, settings)
        }
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn tree(&self) -> &'a Value {
        self.tree
    }

    fn lookup(&self, key_path: &str) -> Option<&'a Value> {
        let mut node = self.tree;
        for comp in key_path.split('.') {
            node = node.as_object()?.get(comp)?;
        }
        if node.is_null() { None } else { Some(node) }
    }

    fn record(&mut self, key_path: &str, success: bool) {
        self.reads += 1;
        if self.do_not_track {
            return;
        }
        let mut state = tracking();
        let counter = state
            .counters
            .entry(self.class_name.to_string())
            .or_default()
            .entry(key_path.to_string())
            .or_insert((0, 0));
        if success {
            counter.0 += 1;
        }
        counter.1 += 1;
    }

    fn parse_warning(&mut self, what: &str, raw: &str, key_path: &str) {
        self.warnings.push(ApiWarning::new(
            WarningKind::StringParse,
            format!(
                "Could not parse {} {:?} for {} object JSON fragment path {:?}.",
                what, raw, self.class_name, key_path
            ),
        ));
    }

    /// Raw value at `key_path`. Objects and arrays are returned as-is.
    pub fn get(&mut self, key_path: &str) -> Option<Value> {
        let value = self.lookup(key_path).cloned();
        self.record(key_path, value.is_some());
        value
    }

    /// String value at `key_path`. Numbers and booleans are stringified.
    pub fn get_str(&mut self, key_path: &str) -> Option<String> {
        let value = match self.lookup(key_path) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => Some(v.to_string()),
            _ => None,
        };
        self.record(key_path, value.is_some());
        value
    }

    pub fn get_i64(&mut self, key_path: &str) -> Option<i64> {
        let value = match self.lookup(key_path) {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => match s.trim().parse() {
                Ok(n) => Some(n),
                Err(_) => {
                    self.parse_warning("integer string", s, key_path);
                    None
                }
            },
            _ => None,
        };
        self.record(key_path, value.is_some());
        value
    }

    /// Calendar date from a `YYYY-MM-DD` string.
    pub fn get_date(&mut self, key_path: &str) -> Option<NaiveDate> {
        let value = match self.lookup(key_path) {
            Some(Value::String(s)) => match parse_iso_date(s) {
                Some(date) => Some(date),
                None => {
                    self.parse_warning("ISO date string", s, key_path);
                    None
                }
            },
            _ => None,
        };
        self.record(key_path, value.is_some());
        value
    }

    /// Timestamp from an ISO style string. Strings without an offset are
    /// read as UTC. The result is in UTC or the local offset depending on
    /// the `utc_time` setting.
    pub fn get_datetime(&mut self, key_path: &str) -> Option<DateTime<FixedOffset>> {
        let value = match self.lookup(key_path) {
            Some(Value::String(s)) => match parse_iso_datetime(s) {
                Some(dt) => Some(if self.settings.utc_time {
                    dt.with_timezone(&Utc).fixed_offset()
                } else {
                    dt.with_timezone(&Local).fixed_offset()
                }),
                None => {
                    self.parse_warning("ISO datetime string", s, key_path);
                    None
                }
            },
            _ => None,
        };
        self.record(key_path, value.is_some());
        value
    }

    /// Absolute URL resolved against the entry point URL.
    pub fn get_url(&mut self, key_path: &str) -> Option<String> {
        let value = match self.lookup(key_path) {
            Some(Value::String(s)) => {
                let joined = match &self.settings.base_url {
                    Some(base) => base.join(s),
                    None => Url::parse(s),
                };
                match joined {
                    Ok(url) => Some(url.to_string()),
                    Err(_) => {
                        self.parse_warning("absolute URL from", s, key_path);
                        None
                    }
                }
            }
            _ => None,
        };
        self.record(key_path, value.is_some());
        value
    }

    /// Ids of a to-many relationship (`[{"type": .., "id": ..}, ..]`).
    pub fn get_id_list(&mut self, key_path: &str) -> Option<Vec<String>> {
        let value = self.lookup(key_path).and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(|item| match item.get("id") {
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => None,
                })
                .collect::<Vec<_>>()
        });
        self.record(key_path, value.is_some());
        value
    }

    /// Finishes reading and records the unaccessed leaf paths of the
    /// fragment. Consumes the reader so no read can follow.
    ///
    /// # Errors
    ///
    /// `XbrlError::ReaderNotUsed` when a tracked reader is closed without
    /// any reads.
    pub fn close(self) -> Result<Vec<ApiWarning>> {
        if self.do_not_track {
            return Ok(self.warnings);
        }
        if self.reads == 0 {
            return Err(XbrlError::ReaderNotUsed(self.class_name.to_string()));
        }
        if let Some(map) = self.tree.as_object() {
            let mut state = tracking();
            let TrackingState {
                counters,
                unaccessed,
                ..
            } = &mut *state;
            let known = counters.get(self.class_name);
            let mut leaves = Vec::new();
            collect_leaf_paths(map, "", &mut leaves);
            for path in leaves {
                if !known.is_some_and(|paths| paths.contains_key(&path)) {
                    unaccessed.insert((self.class_name.to_string(), path));
                }
            }
        }
        Ok(self.warnings)
    }
}

fn collect_leaf_paths(map: &Map<String, Value>, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) => collect_leaf_paths(inner, &path, out),
            _ => out.push(path),
        }
    }
}

fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let parts = s
        .split('-')
        .map(|part| part.trim().parse::<i64>().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [y, m, d] => NaiveDate::from_ymd_opt(
            i32::try_from(*y).ok()?,
            u32::try_from(*m).ok()?,
            u32::try_from(*d).ok()?,
        ),
        _ => None,
    }
}

fn parse_iso_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Remembers a resource type this client does not process. `origin` is
/// `"data"` or `"included"`.
pub(crate) fn record_unexpected_type(type_name: &str, origin: &str) {
    tracking()
        .unexpected_types
        .insert((type_name.to_string(), origin.to_string()));
}

/// Key paths found in API responses but never read, as
/// `(class name, key path)` pairs.
pub fn unaccessed_key_paths() -> BTreeSet<(String, String)> {
    tracking().unaccessed.clone()
}

/// Retrieval counts of every key path read so far.
pub fn key_path_availability_counts() -> Vec<KeyPathRetrieveCounts> {
    let state = tracking();
    state
        .counters
        .iter()
        .flat_map(|(class_name, paths)| {
            paths
                .iter()
                .map(move |(key_path, &(success_count, total_count))| {
                    KeyPathRetrieveCounts {
                        class_name: class_name.clone(),
                        key_path: key_path.clone(),
                        success_count,
                        total_count,
                    }
                })
        })
        .collect()
}

/// Resource types encountered but not processed, as `(type, origin)`.
pub fn unexpected_resource_types() -> BTreeSet<(String, String)> {
    tracking().unexpected_types.clone()
}

/// Clears all tracking tables.
pub fn reset_tracking() {
    *tracking() = TrackingState::default();
}
