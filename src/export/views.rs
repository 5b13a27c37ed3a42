//! Views created in exported SQLite databases.

/// A named SQL view.
///
/// The view is created only if all of `required_tables` exist in the
/// database after the export has created its tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteView {
    pub name: String,
    pub required_tables: Vec<String>,
    /// `SELECT` statement of the view
    pub sql: String,
}

impl SqliteView {
    pub fn new(
        name: impl Into<String>,
        required_tables: &[&str],
        sql: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            required_tables: required_tables.iter().map(|t| t.to_string()).collect(),
            sql: sql.into(),
        }
    }
}

const NUMERIC_ERRORS_SQL: &str = "
WITH enclosure AS (
  SELECT
    f.api_id AS filing_api_id,
    f.entity_api_id,
    e.name AS entity_name,
    f.reporting_date,
    f.language,
    row_number() OVER (
      PARTITION BY f.entity_api_id, f.reporting_date ORDER BY f.language
    ) AS language_rank
  FROM Filing AS f
    JOIN Entity AS e ON e.api_id = f.entity_api_id
),
numeric AS (
  SELECT
    api_id AS validation_message_api_id,
    filing_api_id,
    CASE WHEN code = 'message:tech_duplicated_facts1'
      THEN 'duplicate' ELSE 'calc' END AS problem,
    coalesce(calc_reported_sum, duplicate_lesser) AS reported,
    coalesce(calc_computed_sum, duplicate_greater) AS expected,
    calc_line_item,
    calc_short_role,
    calc_context_id,
    row_number() OVER (
      PARTITION BY filing_api_id, code, duplicate_lesser, duplicate_greater
    ) AS occurrence
  FROM ValidationMessage
  WHERE code IN ('xbrl.5.2.5.2:calcInconsistency', 'message:tech_duplicated_facts1')
)
SELECT
  entity_name,
  reporting_date,
  problem,
  reported / 1000 AS reportedK,
  expected / 1000 AS computedOrDuplicateK,
  abs(expected - reported) / 1000 AS reportedErrorK,
  round(100 * abs((expected - reported) / reported), 2) AS errorPercent,
  calc_line_item,
  calc_short_role,
  calc_context_id,
  language,
  numeric.filing_api_id,
  entity_api_id,
  validation_message_api_id
FROM numeric
  JOIN enclosure ON enclosure.filing_api_id = numeric.filing_api_id
WHERE language_rank = 1
  AND (problem = 'calc' OR occurrence = 1)
ORDER BY errorPercent DESC NULLS FIRST
";

const ENCLOSURE_SQL: &str = "
SELECT
  e.name AS entity_name,
  f.reporting_date,
  f.country,
  group_concat(f.language, ', ') AS languages,
  group_concat(f.api_id, ', ') AS filing_api_ids,
  avg(f.error_count) AS error_count,
  avg(f.inconsistency_count) AS inconsistency_count,
  avg(f.warning_count) AS warning_count,
  min(f.added_time) AS added_time,
  max(f.processed_time) AS processed_time,
  e.identifier,
  e.api_id AS entity_api_id
FROM Filing AS f
  JOIN Entity AS e ON e.api_id = f.entity_api_id
GROUP BY e.api_id, f.reporting_date
ORDER BY e.name, f.reporting_date
";

const FILING_AGE_SQL: &str = "
SELECT
  e.name AS entity_name,
  f.reporting_date,
  f.language,
  round((julianday('now') - julianday(f.reporting_date)) / 30.4375, 1) AS ageNowMonths,
  round((julianday(f.added_time) - julianday(f.reporting_date)) / 30.4375, 1) AS ageAddedMonths,
  f.added_time,
  f.api_id AS filing_api_id,
  e.api_id AS entity_api_id
FROM Filing AS f
  LEFT JOIN Entity AS e ON e.api_id = f.entity_api_id
ORDER BY ageNowMonths DESC
";

/// Views created by default on SQLite export.
///
/// - `ViewNumericErrors`: calculation and duplicate errors of one
///   language version per entity and reporting date, worst first.
/// - `ViewEnclosure`: language versions of the same report on one row.
/// - `ViewFilingAge`: months from the end of the reporting period to the
///   present and to the time the filing was added.
pub fn default_views() -> Vec<SqliteView> {
    vec![
        SqliteView::new(
            "ViewNumericErrors",
            &["Filing", "Entity", "ValidationMessage"],
            NUMERIC_ERRORS_SQL,
        ),
        SqliteView::new("ViewEnclosure", &["Filing", "Entity"], ENCLOSURE_SQL),
        SqliteView::new("ViewFilingAge", &["Filing", "Entity"], FILING_AGE_SQL),
    ]
}
