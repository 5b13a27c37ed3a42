use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, Weak};

use super::error::Result;
use super::export::columns::{DataRecord, DataValue};
use super::filing::Filing;
use super::parsing::{FieldPathReader, ParseSettings};
use super::resource::{RequestInfo, ResourceKind};
use super::warning::{ApiWarning, WarningKind};

const SEVERITY: &str = "attributes.severity";
const TEXT: &str = "attributes.message";
const CODE: &str = "attributes.code";

pub const CALC_INCONSISTENCY_CODE: &str = "xbrl.5.2.5.2:calcInconsistency";
pub const DUPLICATED_FACTS_CODE: &str = "message:tech_duplicated_facts1";

static LINE_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bfrom (\S+)").unwrap());
static SHORT_ROLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\blink role (\S+)").unwrap());
static REPORTED_SUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\breported sum (\S+)").unwrap());
static COMPUTED_SUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bcomputed sum (\S+)").unwrap());
static CONTEXT_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bcontext (\S+)").unwrap());
static UNREPORTED_ITEMS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bunreportedContributingItems (.+)").unwrap());
static COMMA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*,\s*").unwrap());
static DUPLICATE_1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bvalue:\s*(\S+)").unwrap());
static DUPLICATE_2_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!=\s+(\S+)").unwrap());

#[derive(Debug)]
struct FilingLink {
    api_id: String,
    filing: Weak<Filing>,
}

/// A message from the validation of a filing.
///
/// Messages about calculation inconsistencies and duplicated facts carry
/// extra fields parsed from the message text.
#[derive(Debug)]
pub struct ValidationMessage {
    pub api_id: String,
    /// Severity, e.g. `ERROR`, `WARNING` or `INCONSISTENCY`
    pub severity: Option<String>,
    /// Message text, trimmed
    pub text: Option<String>,
    /// Code of the failed validation rule
    pub code: Option<String>,
    pub calc_computed_sum: Option<f64>,
    pub calc_reported_sum: Option<f64>,
    pub calc_context_id: Option<String>,
    pub calc_line_item: Option<String>,
    /// Last path segment of the calculation link role URI
    pub calc_short_role: Option<String>,
    pub calc_unreported_items: Option<Vec<String>>,
    pub duplicate_greater: Option<f64>,
    pub duplicate_lesser: Option<f64>,
    pub request_url: String,
    pub request_time: DateTime<FixedOffset>,
    filing: Mutex<Option<FilingLink>>,
}

impl ValidationMessage {
    pub const KIND: ResourceKind = ResourceKind::ValidationMessage;

    pub(crate) fn from_json(
        api_id: &str,
        json: &Value,
        request: &RequestInfo,
        settings: &ParseSettings,
    ) -> Result<(Self, Vec<ApiWarning>)> {
        let mut reader = FieldPathReader::new(Self::KIND.class_name(), json, settings);
        reader.get_str("type");
        reader.get_str("id");
        reader.get("links.self");
        let severity = reader.get_str(SEVERITY);
        let text = reader.get_str(TEXT).map(|t| t.trim().to_string());
        let code = reader.get_str(CODE);
        let mut warnings = reader.close()?;

        let mut message = Self {
            api_id: api_id.to_string(),
            severity,
            text,
            code,
            calc_computed_sum: None,
            calc_reported_sum: None,
            calc_context_id: None,
            calc_line_item: None,
            calc_short_role: None,
            calc_unreported_items: None,
            duplicate_greater: None,
            duplicate_lesser: None,
            request_url: request.url.clone(),
            request_time: request.time,
            filing: Mutex::new(None),
        };
        message.derive_fields(&mut warnings);
        Ok((message, warnings))
    }

    fn derive_fields(&mut self, warnings: &mut Vec<ApiWarning>) {
        let Some(text) = self.text.clone() else {
            return;
        };
        match self.code.as_deref() {
            Some(CALC_INCONSISTENCY_CODE) => {
                self.calc_computed_sum =
                    derive_float(&COMPUTED_SUM_RE, &text, "calc_computed_sum", warnings);
                self.calc_reported_sum =
                    derive_float(&REPORTED_SUM_RE, &text, "calc_reported_sum", warnings);
                self.calc_context_id = derive_str(&CONTEXT_ID_RE, &text);
                self.calc_line_item = derive_str(&LINE_ITEM_RE, &text);
                self.calc_short_role = derive_str(&SHORT_ROLE_RE, &text).map(short_role);
                self.calc_unreported_items = derive_str(&UNREPORTED_ITEMS_RE, &text)
                    .filter(|items| !items.eq_ignore_ascii_case("none"))
                    .map(|items| COMMA_RE.split(&items).map(str::to_string).collect());
            }
            Some(DUPLICATED_FACTS_CODE) => {
                let first = derive_float(&DUPLICATE_1_RE, &text, "duplicate_*", warnings);
                let second = derive_float(&DUPLICATE_2_RE, &text, "duplicate_*", warnings);
                if let (Some(a), Some(b)) = (first, second) {
                    self.duplicate_greater = Some(a.max(b));
                    self.duplicate_lesser = Some(a.min(b));
                }
            }
            _ => {}
        }
    }

    fn link(&self) -> MutexGuard<'_, Option<FilingLink>> {
        self.filing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The filing this message belongs to.
    pub fn filing(&self) -> Option<Arc<Filing>> {
        self.link().as_ref().and_then(|l| l.filing.upgrade())
    }

    pub fn filing_api_id(&self) -> Option<String> {
        self.link().as_ref().map(|l| l.api_id.clone())
    }

    pub(crate) fn has_filing(&self) -> bool {
        self.link().is_some()
    }

    pub(crate) fn set_filing(&self, api_id: &str, filing: Weak<Filing>) {
        *self.link() = Some(FilingLink {
            api_id: api_id.to_string(),
            filing,
        });
    }

    /// Copy without the filing link.
    pub(crate) fn copy_detached(&self) -> Self {
        Self {
            api_id: self.api_id.clone(),
            severity: self.severity.clone(),
            text: self.text.clone(),
            code: self.code.clone(),
            calc_computed_sum: self.calc_computed_sum,
            calc_reported_sum: self.calc_reported_sum,
            calc_context_id: self.calc_context_id.clone(),
            calc_line_item: self.calc_line_item.clone(),
            calc_short_role: self.calc_short_role.clone(),
            calc_unreported_items: self.calc_unreported_items.clone(),
            duplicate_greater: self.duplicate_greater,
            duplicate_lesser: self.duplicate_lesser,
            request_url: self.request_url.clone(),
            request_time: self.request_time,
            filing: Mutex::new(None),
        }
    }
}

fn derive_str(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|caps| caps[1].to_string())
}

fn derive_float(
    re: &Regex,
    text: &str,
    attr_name: &str,
    warnings: &mut Vec<ApiWarning>,
) -> Option<f64> {
    let raw = derive_str(re, text)?;
    match raw.replace(',', "").parse::<f64>() {
        Ok(value) => Some(value),
        Err(_) => {
            warnings.push(ApiWarning::new(
                WarningKind::DerivedValue,
                format!("String {raw:?} of attribute {attr_name:?} could not be parsed into float."),
            ));
            None
        }
    }
}

fn short_role(role: String) -> String {
    let path = match url::Url::parse(&role) {
        Ok(url) => url.path().to_string(),
        Err(_) => role.clone(),
    };
    match path.trim_end_matches('/').rsplit('/').next() {
        Some(last) if !last.trim().is_empty() => last.to_string(),
        _ => role,
    }
}

impl PartialEq for ValidationMessage {
    fn eq(&self, other: &Self) -> bool {
        self.api_id == other.api_id
    }
}

impl Eq for ValidationMessage {}

impl Hash for ValidationMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Self::KIND.type_tag().hash(state);
        self.api_id.hash(state);
    }
}

impl fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text.as_deref().unwrap_or(""))
    }
}

impl DataRecord for ValidationMessage {
    const CLASS_NAME: &'static str = "ValidationMessage";

    fn data_attributes() -> &'static [&'static str] {
        &[
            "api_id",
            "severity",
            "text",
            "code",
            "filing_api_id",
            "calc_computed_sum",
            "calc_reported_sum",
            "calc_context_id",
            "calc_line_item",
            "calc_short_role",
            "calc_unreported_items",
            "duplicate_greater",
            "duplicate_lesser",
            "request_time",
            "request_url",
        ]
    }

    fn data_value(&self, attr: &str) -> Option<DataValue> {
        let value = match attr {
            "api_id" => DataValue::Text(self.api_id.clone()),
            "severity" => self.severity.clone().into(),
            "text" => self.text.clone().into(),
            "code" => self.code.clone().into(),
            "filing_api_id" => self.filing_api_id().into(),
            "calc_computed_sum" => self.calc_computed_sum.into(),
            "calc_reported_sum" => self.calc_reported_sum.into(),
            "calc_context_id" => self.calc_context_id.clone().into(),
            "calc_line_item" => self.calc_line_item.clone().into(),
            "calc_short_role" => self.calc_short_role.clone().into(),
            "calc_unreported_items" => self.calc_unreported_items.clone().into(),
            "duplicate_greater" => self.duplicate_greater.into(),
            "duplicate_lesser" => self.duplicate_lesser.into(),
            "request_time" => DataValue::DateTime(self.request_time),
            "request_url" => DataValue::Text(self.request_url.clone()),
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    const CALC_TEXT: &str = "Calculation inconsistent from \
        ifrs-full:ProfitLossFromOperatingActivities in link role \
        http://www.asml.com/role/StatementofcomprehensiveincomeprofitorlossbyfunctionofexpenseStatement \
        reported sum 7,043,900,000 computed sum 6,830,200,000 context \
        i7b009074c59c4f71a2c42ac624464775_D20210101-20211231 unit \
        i7fea15d1f3474cdda60b5fff2a4cb15c_e88d9918-4a9b-3a03-83ff-99baed260fc9 \
        unreportedContributingItems ifrs-full:OtherIncome";
    const DUPLICATE_STR_TEXT: &str = "Duplicated facts with different values have been \
        reported for: ix:nonNumeric, value:Sede legale in Trieste  != piazza Duca degli \
        Abruzzi, 2 please review selected entries.";
    const DUPLICATE_NUM_TEXT: &str = "Duplicated facts with different values have been \
        reported for: ix:nonFraction, value:-637000 != -478000 please review selected entries.";

    fn message(id: &str, code: &str, text: &str) -> (ValidationMessage, Vec<ApiWarning>) {
        let json = json!({
            "type": "validation_message",
            "id": id,
            "attributes": {"severity": "WARNING", "message": format!("  {text}\n"), "code": code}
        });
        let request = RequestInfo {
            url: "https://filings.xbrl.org/api/filings".to_string(),
            time: Utc::now().fixed_offset(),
        };
        ValidationMessage::from_json(id, &json, &request, &ParseSettings::default()).unwrap()
    }

    #[test]
    fn calc_inconsistency_fields() {
        let (msg, warnings) = message("66614", CALC_INCONSISTENCY_CODE, CALC_TEXT);
        assert!(warnings.is_empty());
        assert_eq!(msg.text.as_deref(), Some(CALC_TEXT));
        assert_eq!(msg.to_string(), CALC_TEXT);
        assert_eq!(msg.calc_computed_sum, Some(6_830_200_000.0));
        assert_eq!(msg.calc_reported_sum, Some(7_043_900_000.0));
        assert_eq!(
            msg.calc_context_id.as_deref(),
            Some("i7b009074c59c4f71a2c42ac624464775_D20210101-20211231")
        );
        assert_eq!(
            msg.calc_line_item.as_deref(),
            Some("ifrs-full:ProfitLossFromOperatingActivities")
        );
        assert_eq!(
            msg.calc_short_role.as_deref(),
            Some("StatementofcomprehensiveincomeprofitorlossbyfunctionofexpenseStatement")
        );
        assert_eq!(
            msg.calc_unreported_items,
            Some(vec!["ifrs-full:OtherIncome".to_string()])
        );
        assert_eq!(msg.duplicate_greater, None);
        assert_eq!(msg.filing_api_id(), None);
    }

    #[test]
    fn unreported_none_is_absent() {
        let text = "Calculation inconsistent from a:B in link role http://x/role/R \
            reported sum 1 computed sum 2 context c unreportedContributingItems none";
        let (msg, _) = message("1", CALC_INCONSISTENCY_CODE, text);
        assert_eq!(msg.calc_unreported_items, None);
    }

    #[test]
    fn duplicate_strings_warn() {
        let (msg, warnings) = message("104877", DUPLICATED_FACTS_CODE, DUPLICATE_STR_TEXT);
        assert_eq!(msg.duplicate_greater, None);
        assert_eq!(msg.duplicate_lesser, None);
        assert_eq!(msg.calc_computed_sum, None);
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.kind == WarningKind::DerivedValue));
    }

    #[test]
    fn duplicate_numbers() {
        let (msg, warnings) = message("41766", DUPLICATED_FACTS_CODE, DUPLICATE_NUM_TEXT);
        assert!(warnings.is_empty());
        assert_eq!(msg.duplicate_greater, Some(-478000.0));
        assert_eq!(msg.duplicate_lesser, Some(-637000.0));
        assert_eq!(msg.calc_unreported_items, None);
    }

    #[test]
    fn other_codes_have_no_derived_fields() {
        let (msg, warnings) = message("66615", "message:positive", "Reported value is below 0");
        assert!(warnings.is_empty());
        assert_eq!(msg.code.as_deref(), Some("message:positive"));
        assert_eq!(msg.calc_reported_sum, None);
        assert_eq!(msg.duplicate_lesser, None);
    }
}
