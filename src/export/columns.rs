//! Column-oriented export of resources.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

/// A single cell value of an exported record.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    NaiveDateTime(NaiveDateTime),
    List(Vec<String>),
}

impl DataValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }
}

impl From<Option<String>> for DataValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(DataValue::Null, DataValue::Text)
    }
}

impl From<Option<&str>> for DataValue {
    fn from(value: Option<&str>) -> Self {
        value.map_or(DataValue::Null, |s| DataValue::Text(s.to_string()))
    }
}

impl From<Option<i64>> for DataValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(DataValue::Null, DataValue::Integer)
    }
}

impl From<Option<f64>> for DataValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(DataValue::Null, DataValue::Real)
    }
}

impl From<Option<NaiveDate>> for DataValue {
    fn from(value: Option<NaiveDate>) -> Self {
        value.map_or(DataValue::Null, DataValue::Date)
    }
}

impl From<Option<DateTime<FixedOffset>>> for DataValue {
    fn from(value: Option<DateTime<FixedOffset>>) -> Self {
        value.map_or(DataValue::Null, DataValue::DateTime)
    }
}

impl From<Option<Vec<String>>> for DataValue {
    fn from(value: Option<Vec<String>>) -> Self {
        value.map_or(DataValue::Null, DataValue::List)
    }
}

/// A resource whose fields can be exported as columns.
pub trait DataRecord {
    /// Table name of the resource.
    const CLASS_NAME: &'static str;

    /// Names of the exportable fields.
    fn data_attributes() -> &'static [&'static str];

    /// Value of an exportable field, `None` for an unknown name.
    fn data_value(&self, attr: &str) -> Option<DataValue>;
}

/// Options of [`data_columns`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnOptions {
    /// Add `entity.` prefixed columns to filings.
    pub with_entity: bool,
    /// Drop the offset of datetimes.
    pub strip_timezone: bool,
    /// Turn dates into naive datetimes at midnight.
    pub date_as_datetime: bool,
    /// Keep `*_url` columns when no names are given.
    pub include_urls: bool,
}

impl Default for ColumnOptions {
    fn default() -> Self {
        Self {
            with_entity: false,
            strip_timezone: true,
            date_as_datetime: true,
            include_urls: false,
        }
    }
}

impl ColumnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, with_entity: bool) -> Self {
        self.with_entity = with_entity;
        self
    }

    pub fn with_strip_timezone(mut self, strip: bool) -> Self {
        self.strip_timezone = strip;
        self
    }

    pub fn with_date_as_datetime(mut self, convert: bool) -> Self {
        self.date_as_datetime = convert;
        self
    }

    pub fn with_include_urls(mut self, include: bool) -> Self {
        self.include_urls = include;
        self
    }

    pub(crate) fn convert(&self, value: DataValue) -> DataValue {
        match value {
            DataValue::DateTime(dt) if self.strip_timezone => DataValue::NaiveDateTime(dt.naive_local()),
            DataValue::Date(d) if self.date_as_datetime => {
                d.and_hms_opt(0, 0, 0).map_or(DataValue::Null, DataValue::NaiveDateTime)
            }
            other => other,
        }
    }
}

/// Export columns in the form `(column name, values)`.
pub type DataColumns = Vec<(String, Vec<DataValue>)>;

fn column_rank(col: &str) -> u8 {
    let mut rank = 1;
    if col == "api_id" {
        rank = 0;
    } else if col.ends_with("_time") {
        rank = 10;
    } else if col.ends_with("_api_id") {
        rank = 20;
    } else if col.ends_with("_url") {
        rank = 22;
    }
    if col.ends_with("request_time") {
        rank = 40;
    }
    if col.ends_with("request_url") {
        rank = 41;
    }
    if col.ends_with("_count") {
        rank = 2;
    } else if col.ends_with("_sha256") {
        rank = 31;
    }
    if col.starts_with("calc_") {
        rank = if col.ends_with("_sum") { 2 } else { 3 };
    } else if col.starts_with("duplicate_") {
        rank = 4;
    }
    rank
}

/// Orders column names for display.
pub fn order_columns<S: AsRef<str>>(cols: &[S]) -> Vec<String> {
    let mut ranked = cols
        .iter()
        .map(|c| (column_rank(c.as_ref()), c.as_ref().to_string()))
        .collect::<Vec<_>>();
    ranked.sort();
    ranked.into_iter().map(|(_, col)| col).collect()
}

/// Default columns of a record type: ordered and without URL columns
/// unless `include_urls` is set.
pub fn default_columns<R: DataRecord>(options: &ColumnOptions) -> Vec<String> {
    order_columns(R::data_attributes())
        .into_iter()
        .filter(|col| options.include_urls || !col.ends_with("_url"))
        .collect()
}

/// Collects column data of `records`. Unknown attribute names yield
/// null cells.
pub fn data_columns<'a, R, I>(records: I, attr_names: &[String], options: &ColumnOptions) -> DataColumns
where
    R: DataRecord + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let mut columns = attr_names
        .iter()
        .map(|name| (name.clone(), Vec::new()))
        .collect::<DataColumns>();
    for record in records {
        for (name, values) in columns.iter_mut() {
            let value = record.data_value(name).unwrap_or(DataValue::Null);
            values.push(options.convert(value));
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_ranked() {
        let cols = [
            "request_url",
            "package_url",
            "added_time",
            "api_id",
            "country",
            "error_count",
            "entity_api_id",
            "package_sha256",
            "request_time",
            "calc_line_item",
            "calc_reported_sum",
            "duplicate_lesser",
        ];
        assert_eq!(
            order_columns(&cols),
            vec![
                "api_id",
                "country",
                "calc_reported_sum",
                "error_count",
                "calc_line_item",
                "duplicate_lesser",
                "added_time",
                "entity_api_id",
                "package_url",
                "package_sha256",
                "request_time",
                "request_url",
            ]
        );
    }

    #[test]
    fn values_are_converted() {
        let options = ColumnOptions::default();
        let date = NaiveDate::from_ymd_opt(2022, 12, 31).unwrap();
        assert_eq!(
            options.convert(DataValue::Date(date)),
            DataValue::NaiveDateTime(date.and_hms_opt(0, 0, 0).unwrap())
        );

        let dt = DateTime::parse_from_rfc3339("2023-02-16T14:33:58+02:00").unwrap();
        assert_eq!(
            options.convert(DataValue::DateTime(dt)),
            DataValue::NaiveDateTime(dt.naive_local())
        );

        let keep = ColumnOptions::new()
            .with_strip_timezone(false)
            .with_date_as_datetime(false);
        assert_eq!(keep.convert(DataValue::Date(date)), DataValue::Date(date));
        assert_eq!(keep.convert(DataValue::DateTime(dt)), DataValue::DateTime(dt));
    }
}
