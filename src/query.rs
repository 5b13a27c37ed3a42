//! Expands a [`FilingQuery`] into the parameter sets of API requests.
//!
//! The API accepts a single value per filter. A filter with several values
//! is therefore turned into separate requests, one for each combination of
//! values. A date filter given as a year or a year-month is expanded into
//! month-end dates before this.

use chrono::NaiveDate;

use super::config::{XbrlConfig, YearFilterMonths};
use super::error::{Result, XbrlError};
use super::options::FilingQuery;
use super::parsing::utils::last_day_of_month;

const DATE_FILTER_SUFFIX: &str = "_date";

/// Request parameters as `(name, value)` pairs.
pub type Params = Vec<(String, String)>;

/// Requests needed for one query call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPlan {
    pub page_size: usize,
    /// Parameters of the first request of each expansion. Following pages
    /// are requested from the `next` links.
    pub param_sets: Vec<Params>,
}

/// Wire name of a filing attribute.
pub fn api_attribute_name(name: &str) -> &str {
    match name {
        "api_id" => "id",
        "filing_index" => "fxo_id",
        "last_end_date" => "period_end",
        "added_time" => "date_added",
        "processed_time" => "processed",
        "xhtml_url" => "report_url",
        "package_sha256" => "sha256",
        // country, *_count, json_url, package_url and viewer_url share
        // their names with the API
        other => other,
    }
}

/// Value of the `sort` request parameter.
pub fn sort_param(sort: &[String]) -> String {
    sort.iter()
        .map(|field| match field.strip_prefix('-') {
            Some(name) => format!("-{}", api_attribute_name(name)),
            None => api_attribute_name(field).to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Page size for a result size cap.
pub fn page_size(max_page_size: usize, max_size: Option<usize>) -> usize {
    match max_size {
        Some(cap) if cap > 0 && cap < max_page_size => cap,
        _ => max_page_size,
    }
}

/// Expands one date filter value into `YYYY-MM-DD` dates.
fn expand_date_value(field: &str, value: &str, months: &YearFilterMonths) -> Result<Vec<String>> {
    let invalid = || XbrlError::InvalidFilter {
        field: field.to_string(),
        value: value.to_string(),
    };
    let nums = value
        .trim()
        .split('-')
        .map(|part| part.parse::<i64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| invalid())?;

    match nums.as_slice() {
        [year] => {
            let year = i32::try_from(*year).map_err(|_| invalid())?;
            let start_year = year.checked_add(months.start.0).ok_or_else(invalid)?;
            let stop_year = year.checked_add(months.stop.0).ok_or_else(invalid)?;
            let (mut y, mut m) = (start_year, months.start.1);
            let stop = (stop_year, months.stop.1);
            let mut dates = Vec::new();
            while (y, m) < stop {
                let month_end = last_day_of_month(y, m).ok_or_else(invalid)?;
                dates.push(month_end.format("%Y-%m-%d").to_string());
                m += 1;
                if m > 12 {
                    y += 1;
                    m = 1;
                }
            }
            Ok(dates)
        }
        [year, month] => {
            let year = i32::try_from(*year).map_err(|_| invalid())?;
            let month = u32::try_from(*month).map_err(|_| invalid())?;
            let month_end = last_day_of_month(year, month).ok_or_else(invalid)?;
            Ok(vec![month_end.format("%Y-%m-%d").to_string()])
        }
        [_, _, _] => {
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
            Ok(vec![value.trim().to_string()])
        }
        _ => Err(invalid()),
    }
}

fn cartesian_product(columns: &[(String, Vec<String>)]) -> Vec<Vec<(String, String)>> {
    columns.iter().fold(vec![Vec::new()], |acc, (name, values)| {
        acc.iter()
            .flat_map(|combo| {
                values.iter().map(move |value| {
                    let mut next = combo.clone();
                    next.push((name.clone(), value.clone()));
                    next
                })
            })
            .collect()
    })
}

fn set_param(params: &mut Params, name: String, value: String) {
    match params.iter_mut().find(|(n, _)| *n == name) {
        Some(existing) => existing.1 = value,
        None => params.push((name, value)),
    }
}

fn filter_param(field: &str) -> String {
    format!("filter[{}]", api_attribute_name(field))
}

/// Builds the request plan of `query`.
///
/// # Errors
///
/// `XbrlError::ConfigError` when the year filter window is inverted and
/// `XbrlError::InvalidFilter` for a date filter that is not a year, a
/// year-month or a date.
pub fn plan(query: &FilingQuery, config: &XbrlConfig) -> Result<RequestPlan> {
    let page_size = page_size(config.max_page_size, query.max_size);

    let mut base: Params = vec![("page[size]".to_string(), page_size.to_string())];
    if let Some(include) = query.flags.include_param() {
        base.push(("include".to_string(), include));
    }
    if !query.sort.is_empty() {
        base.push(("sort".to_string(), sort_param(&query.sort)));
    }

    let has_date_filters = query
        .filters
        .iter()
        .any(|(field, _)| field.ends_with(DATE_FILTER_SUFFIX));
    if has_date_filters {
        config.year_filter_months.validate()?;
    }

    let mut singles: Vec<(String, String)> = Vec::new();
    let mut multis: Vec<(String, Vec<String>)> = Vec::new();
    for (field, value) in &query.filters {
        let values = if field.ends_with(DATE_FILTER_SUFFIX) {
            let mut resolved = Vec::new();
            for v in value.values() {
                resolved.extend(expand_date_value(field, &v, &config.year_filter_months)?);
            }
            resolved
        } else {
            value.values()
        };
        match values.as_slice() {
            [single] => singles.push((field.clone(), single.clone())),
            _ => multis.push((field.clone(), values)),
        }
    }

    for (field, value) in singles {
        base.push((filter_param(&field), value));
    }

    let mut param_sets = if multis.is_empty() {
        vec![base]
    } else {
        cartesian_product(&multis)
            .into_iter()
            .map(|combo| {
                let mut params = base.clone();
                for (field, value) in combo {
                    params.push((filter_param(&field), value));
                }
                params
            })
            .collect()
    };

    for params in param_sets.iter_mut() {
        for (name, value) in &query.api_params {
            set_param(params, name.clone(), value.clone());
        }
    }

    Ok(RequestPlan {
        page_size,
        param_sets,
    })
}
