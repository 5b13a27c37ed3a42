//! The filing resource and its links to entities and validation messages.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use super::entity::Entity;
use super::error::Result;
use super::export::columns::{DataRecord, DataValue};
use super::parsing::utils::{
    correct_language_code, date_from_stem, language_from_stem, simple_filing_date, url_stem,
};
use super::parsing::{FieldPathReader, ParseSettings};
use super::resource::{RequestInfo, ResourceKind};
use super::validation_message::ValidationMessage;
use super::warning::{ApiWarning, WarningKind};

const COUNTRY: &str = "attributes.country";
const FILING_INDEX: &str = "attributes.fxo_id";
const LAST_END_DATE: &str = "attributes.period_end";
const ERROR_COUNT: &str = "attributes.error_count";
const INCONSISTENCY_COUNT: &str = "attributes.inconsistency_count";
const WARNING_COUNT: &str = "attributes.warning_count";
const ADDED_TIME: &str = "attributes.date_added";
const PROCESSED_TIME: &str = "attributes.processed";
const JSON_URL: &str = "attributes.json_url";
const PACKAGE_URL: &str = "attributes.package_url";
const VIEWER_URL: &str = "attributes.viewer_url";
const XHTML_URL: &str = "attributes.report_url";
const PACKAGE_SHA256: &str = "attributes.sha256";
const ENTITY_API_ID: &str = "relationships.entity.data.id";
const VALIDATION_MESSAGES: &str = "relationships.validation_messages.data";

/// A filing of a report in the XBRL repository.
///
/// `language` and `reporting_date` are derived from the file name of the
/// package. When the file name has no date, `reporting_date` falls back to
/// `last_end_date`.
#[derive(Debug)]
pub struct Filing {
    pub api_id: String,
    /// Country code of the jurisdiction
    pub country: Option<String>,
    /// Composite index of the filing, e.g.
    /// `724500Y6DUVHQD6OXN27-2022-12-31-ESEF-NL-0`
    pub filing_index: Option<String>,
    /// Two-letter language code of the report
    pub language: Option<String>,
    /// Latest end date of the facts in the report
    pub last_end_date: Option<NaiveDate>,
    /// End date of the reporting period
    pub reporting_date: Option<NaiveDate>,
    pub error_count: Option<i64>,
    pub inconsistency_count: Option<i64>,
    pub warning_count: Option<i64>,
    pub added_time: Option<DateTime<FixedOffset>>,
    pub processed_time: Option<DateTime<FixedOffset>>,
    pub entity_api_id: Option<String>,
    pub json_url: Option<String>,
    pub package_url: Option<String>,
    pub viewer_url: Option<String>,
    pub xhtml_url: Option<String>,
    pub package_sha256: Option<String>,
    pub request_url: String,
    pub request_time: DateTime<FixedOffset>,
    entity: Option<Arc<Entity>>,
    validation_messages: Option<Vec<Arc<ValidationMessage>>>,
}

/// Field values of a filing read from JSON before it is linked.
#[derive(Debug, Clone)]
pub(crate) struct FilingFields {
    api_id: String,
    country: Option<String>,
    filing_index: Option<String>,
    language: Option<String>,
    last_end_date: Option<NaiveDate>,
    reporting_date: Option<NaiveDate>,
    error_count: Option<i64>,
    inconsistency_count: Option<i64>,
    warning_count: Option<i64>,
    added_time: Option<DateTime<FixedOffset>>,
    processed_time: Option<DateTime<FixedOffset>>,
    entity_api_id: Option<String>,
    json_url: Option<String>,
    package_url: Option<String>,
    viewer_url: Option<String>,
    xhtml_url: Option<String>,
    package_sha256: Option<String>,
    request_url: String,
    request_time: DateTime<FixedOffset>,
    message_ids: Option<Vec<String>>,
}

impl FilingFields {
    pub(crate) fn from_json(
        api_id: &str,
        json: &Value,
        request: &RequestInfo,
        settings: &ParseSettings,
    ) -> Result<(Self, Vec<ApiWarning>)> {
        let mut reader = FieldPathReader::new(Filing::KIND.class_name(), json, settings);
        reader.get_str("type");
        reader.get_str("id");
        reader.get("links.self");
        reader.get("relationships.entity.links.related");
        reader.get("relationships.entity.data.type");
        reader.get("relationships.validation_messages.links.related");

        let country = reader.get_str(COUNTRY);
        let filing_index = reader.get_str(FILING_INDEX);
        let last_end_date = reader.get_date(LAST_END_DATE);
        let error_count = reader.get_i64(ERROR_COUNT);
        let inconsistency_count = reader.get_i64(INCONSISTENCY_COUNT);
        let warning_count = reader.get_i64(WARNING_COUNT);
        let added_time = reader.get_datetime(ADDED_TIME);
        let processed_time = reader.get_datetime(PROCESSED_TIME);
        let entity_api_id = reader.get_str(ENTITY_API_ID);
        let json_url = reader.get_url(JSON_URL);
        let package_url = reader.get_url(PACKAGE_URL);
        let viewer_url = reader.get_url(VIEWER_URL);
        let xhtml_url = reader.get_url(XHTML_URL);
        let package_sha256 = reader.get_str(PACKAGE_SHA256);
        let message_ids = reader.get_id_list(VALIDATION_MESSAGES);
        let warnings = reader.close()?;

        let language = derive_language(package_url.as_deref(), xhtml_url.as_deref(), country.as_deref());
        let reporting_date = package_url
            .as_deref()
            .and_then(url_stem)
            .and_then(|stem| date_from_stem(&stem))
            .or(last_end_date);

        Ok((
            Self {
                api_id: api_id.to_string(),
                country,
                filing_index,
                language,
                last_end_date,
                reporting_date,
                error_count,
                inconsistency_count,
                warning_count,
                added_time,
                processed_time,
                entity_api_id,
                json_url,
                package_url,
                viewer_url,
                xhtml_url,
                package_sha256,
                request_url: request.url.clone(),
                request_time: request.time,
                message_ids,
            },
            warnings,
        ))
    }
}

fn derive_language(
    package_url: Option<&str>,
    xhtml_url: Option<&str>,
    country: Option<&str>,
) -> Option<String> {
    let language = [package_url, xhtml_url]
        .into_iter()
        .flatten()
        .filter_map(url_stem)
        .find_map(|stem| language_from_stem(&stem));
    correct_language_code(language, country)
}

/// Side records a new filing may link to. `None` means the kind was not
/// requested and no link is attempted.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LinkCandidates<'a> {
    pub entities: Option<&'a HashMap<String, Arc<Entity>>>,
    pub messages: Option<&'a HashMap<String, Arc<ValidationMessage>>>,
}

impl Filing {
    pub const KIND: ResourceKind = ResourceKind::Filing;

    /// Builds a filing and links it to the candidate side records.
    ///
    /// Missing references produce [`WarningKind::Reference`] warnings and
    /// leave the reference unset.
    pub(crate) fn link(
        fields: FilingFields,
        candidates: LinkCandidates<'_>,
        warnings: &mut Vec<ApiWarning>,
    ) -> Arc<Filing> {
        let entity = candidates.entities.and_then(|entities| {
            match fields.entity_api_id.as_deref() {
                None => {
                    warnings.push(ApiWarning::new(
                        WarningKind::Reference,
                        format!("No entity defined for filing api_id={}", fields.api_id),
                    ));
                    None
                }
                Some(id) => {
                    let found = entities.get(id).cloned();
                    if found.is_none() {
                        warnings.push(ApiWarning::new(
                            WarningKind::Reference,
                            format!(
                                "Entity with api_id={} not found for filing api_id={}",
                                id, fields.api_id
                            ),
                        ));
                    }
                    found
                }
            }
        });

        let messages = candidates.messages.map(|messages| {
            let ids = fields.message_ids.as_deref().unwrap_or_default();
            ids.iter()
                .filter_map(|id| {
                    let found = messages.get(id).cloned();
                    if found.is_none() {
                        warnings.push(ApiWarning::new(
                            WarningKind::Reference,
                            format!(
                                "Validation message with api_id={} not found for filing api_id={}",
                                id, fields.api_id
                            ),
                        ));
                    }
                    found
                })
                .collect::<Vec<_>>()
        });

        Self::assemble(fields, entity, messages)
    }

    fn assemble(
        fields: FilingFields,
        entity: Option<Arc<Entity>>,
        validation_messages: Option<Vec<Arc<ValidationMessage>>>,
    ) -> Arc<Filing> {
        Arc::new_cyclic(|weak: &Weak<Filing>| {
            if let Some(entity) = &entity {
                entity.attach_filing(weak.clone());
            }
            for message in validation_messages.iter().flatten() {
                message.set_filing(&fields.api_id, weak.clone());
            }
            Filing {
                api_id: fields.api_id,
                country: fields.country,
                filing_index: fields.filing_index,
                language: fields.language,
                last_end_date: fields.last_end_date,
                reporting_date: fields.reporting_date,
                error_count: fields.error_count,
                inconsistency_count: fields.inconsistency_count,
                warning_count: fields.warning_count,
                added_time: fields.added_time,
                processed_time: fields.processed_time,
                entity_api_id: fields.entity_api_id,
                json_url: fields.json_url,
                package_url: fields.package_url,
                viewer_url: fields.viewer_url,
                xhtml_url: fields.xhtml_url,
                package_sha256: fields.package_sha256,
                request_url: fields.request_url,
                request_time: fields.request_time,
                entity,
                validation_messages,
            }
        })
    }

    fn fields(&self) -> FilingFields {
        FilingFields {
            api_id: self.api_id.clone(),
            country: self.country.clone(),
            filing_index: self.filing_index.clone(),
            language: self.language.clone(),
            last_end_date: self.last_end_date,
            reporting_date: self.reporting_date,
            error_count: self.error_count,
            inconsistency_count: self.inconsistency_count,
            warning_count: self.warning_count,
            added_time: self.added_time,
            processed_time: self.processed_time,
            entity_api_id: self.entity_api_id.clone(),
            json_url: self.json_url.clone(),
            package_url: self.package_url.clone(),
            viewer_url: self.viewer_url.clone(),
            xhtml_url: self.xhtml_url.clone(),
            package_sha256: self.package_sha256.clone(),
            request_url: self.request_url.clone(),
            request_time: self.request_time,
            message_ids: None,
        }
    }

    /// Copies the filing and its validation messages into a new object
    /// graph. The copy is linked to `entity`, which should be an entity
    /// of the receiving graph.
    pub(crate) fn deep_copy(&self, entity: Option<Arc<Entity>>) -> Arc<Filing> {
        let messages = self.validation_messages.as_ref().map(|messages| {
            messages
                .iter()
                .map(|m| Arc::new(m.copy_detached()))
                .collect::<Vec<_>>()
        });
        Self::assemble(self.fields(), entity, messages)
    }

    /// The entity of the filing if it was requested and found.
    pub fn entity(&self) -> Option<&Arc<Entity>> {
        self.entity.as_ref()
    }

    /// Validation messages of the filing. `None` if they were not requested.
    pub fn validation_messages(&self) -> Option<&[Arc<ValidationMessage>]> {
        self.validation_messages.as_deref()
    }

    /// Year of the reporting period.
    pub fn reporting_year(&self) -> Option<i32> {
        self.reporting_date.map(|d| d.year())
    }

    /// Removes this filing from the back-references of its entity.
    pub(crate) fn detach_from_entity(&self) {
        if let Some(entity) = &self.entity {
            entity.detach_filing(self);
        }
    }
}

impl PartialEq for Filing {
    fn eq(&self, other: &Self) -> bool {
        self.api_id == other.api_id
    }
}

impl Eq for Filing {}

impl Hash for Filing {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Self::KIND.type_tag().hash(state);
        self.api_id.hash(state);
    }
}

impl fmt::Display for Filing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(name) = self.entity.as_ref().and_then(|e| e.name.clone()) {
            parts.push(name);
        } else if let Some(index) = &self.filing_index {
            parts.push(index.clone());
        }
        if let Some(date) = self.reporting_date {
            parts.push(simple_filing_date(date));
        }
        if let Some(language) = &self.language {
            parts.push(format!("[{language}]"));
        }
        f.write_str(&parts.join(" "))
    }
}

impl DataRecord for Filing {
    const CLASS_NAME: &'static str = "Filing";

    fn data_attributes() -> &'static [&'static str] {
        &[
            "api_id",
            "country",
            "filing_index",
            "language",
            "last_end_date",
            "reporting_date",
            "error_count",
            "inconsistency_count",
            "warning_count",
            "added_time",
            "processed_time",
            "entity_api_id",
            "json_url",
            "package_url",
            "viewer_url",
            "xhtml_url",
            "package_sha256",
            "request_time",
            "request_url",
        ]
    }

    fn data_value(&self, attr: &str) -> Option<DataValue> {
        let value = match attr {
            "api_id" => DataValue::Text(self.api_id.clone()),
            "country" => self.country.clone().into(),
            "filing_index" => self.filing_index.clone().into(),
            "language" => self.language.clone().into(),
            "last_end_date" => self.last_end_date.into(),
            "reporting_date" => self.reporting_date.into(),
            "error_count" => self.error_count.into(),
            "inconsistency_count" => self.inconsistency_count.into(),
            "warning_count" => self.warning_count.into(),
            "added_time" => self.added_time.into(),
            "processed_time" => self.processed_time.into(),
            "entity_api_id" => self.entity_api_id.clone().into(),
            "json_url" => self.json_url.clone().into(),
            "package_url" => self.package_url.clone().into(),
            "viewer_url" => self.viewer_url.clone().into(),
            "xhtml_url" => self.xhtml_url.clone().into(),
            "package_sha256" => self.package_sha256.clone().into(),
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

    fn request() -> RequestInfo {
        RequestInfo {
            url: "https://filings.xbrl.org/api/filings".to_string(),
            time: Utc::now().fixed_offset(),
        }
    }

    fn asml_json() -> Value {
        json!({
            "type": "filing",
            "id": "4261",
            "attributes": {
                "date_added": "2023-02-16 14:33:58.236220",
                "country": "NL",
                "sha256": "3f44981c656dc2bcd0ed3a88e6d062e6b8c041a656f420257bccd63535c2b6ac",
                "report_url": "/724500Y6DUVHQD6OXN27/2022-12-31/ESEF/NL/0/asml-2022-12-31-en/reports/asml-2022-12-31-en.xhtml",
                "fxo_id": "724500Y6DUVHQD6OXN27-2022-12-31-ESEF-NL-0",
                "error_count": 0,
                "inconsistency_count": 4,
                "viewer_url": "/724500Y6DUVHQD6OXN27/2022-12-31/ESEF/NL/0/asml-2022-12-31-en/reports/ixbrlviewer.html",
                "json_url": "/724500Y6DUVHQD6OXN27/2022-12-31/ESEF/NL/0/asml-2022-12-31-en.json",
                "processed": "2023-04-19 10:20:23.668110",
                "warning_count": 7,
                "period_end": "2022-12-31",
                "package_url": "/724500Y6DUVHQD6OXN27/2022-12-31/ESEF/NL/0/asml-2022-12-31-en.zip"
            },
            "relationships": {
                "validation_messages": {
                    "links": {"related": "/api/filings/4261/validation_messages"},
                    "data": [
                        {"type": "validation_message", "id": "66611"},
                        {"type": "validation_message", "id": "66612"}
                    ]
                },
                "entity": {
                    "links": {"related": "/api/entities/724500Y6DUVHQD6OXN27"},
                    "data": {"type": "entity", "id": "1969"}
                }
            },
            "links": {"self": "/api/filings/4261"}
        })
    }

    fn fields(json: &Value) -> (FilingFields, Vec<ApiWarning>) {
        FilingFields::from_json("4261", json, &request(), &ParseSettings::default()).unwrap()
    }

    #[test]
    fn parse_asml_filing() {
        let (fields, warnings) = fields(&asml_json());
        assert!(warnings.is_empty());
        let filing = Filing::link(fields, LinkCandidates::default(), &mut Vec::new());

        assert_eq!(filing.country.as_deref(), Some("NL"));
        assert_eq!(
            filing.filing_index.as_deref(),
            Some("724500Y6DUVHQD6OXN27-2022-12-31-ESEF-NL-0")
        );
        assert_eq!(filing.language.as_deref(), Some("en"));
        assert_eq!(filing.reporting_date, NaiveDate::from_ymd_opt(2022, 12, 31));
        assert_eq!(filing.last_end_date, NaiveDate::from_ymd_opt(2022, 12, 31));
        assert_eq!(filing.error_count, Some(0));
        assert_eq!(filing.inconsistency_count, Some(4));
        assert_eq!(filing.warning_count, Some(7));
        assert_eq!(filing.entity_api_id.as_deref(), Some("1969"));
        assert_eq!(
            filing.package_url.as_deref(),
            Some("https://filings.xbrl.org/724500Y6DUVHQD6OXN27/2022-12-31/ESEF/NL/0/asml-2022-12-31-en.zip")
        );
        assert_eq!(
            filing.added_time.map(|t| t.with_timezone(&Utc).to_rfc3339()),
            Some("2023-02-16T14:33:58.236220+00:00".to_string())
        );
        assert!(filing.entity().is_none());
        assert!(filing.validation_messages().is_none());
        assert_eq!(filing.to_string(), "724500Y6DUVHQD6OXN27-2022-12-31-ESEF-NL-0 2022 [en]");
    }

    #[test]
    fn same_id_means_same_filing() {
        use crate::filing_set::FilingSet;
        use std::collections::hash_map::DefaultHasher;

        let mut other = asml_json();
        other["attributes"] = json!({"country": "DK", "error_count": 3});
        other["relationships"] = json!({});
        let first = Filing::link(fields(&asml_json()).0, LinkCandidates::default(), &mut Vec::new());
        let second = Filing::link(fields(&other).0, LinkCandidates::default(), &mut Vec::new());
        assert_ne!(first.country, second.country);

        assert_eq!(first, second);
        let digest = |filing: &Filing| {
            let mut hasher = DefaultHasher::new();
            filing.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(digest(&first), digest(&second));

        let mut set = FilingSet::new();
        assert!(set.add(&first));
        let held = set.get("4261").unwrap().clone();
        assert!(!set.add(&second));
        assert_eq!(set.len(), 1);
        assert!(Arc::ptr_eq(set.get("4261").unwrap(), &held));
        assert_eq!(held.country.as_deref(), Some("NL"));
    }

    #[test]
    fn reporting_date_falls_back_to_last_end_date() {
        let mut json = asml_json();
        json["attributes"]["package_url"] = json!("/lei/ESEF/NL/0/asml-annual-report-en.zip");
        json["attributes"]["period_end"] = json!("2022-06-30");
        let (fields, _) = fields(&json);
        let filing = Filing::link(fields, LinkCandidates::default(), &mut Vec::new());
        assert_eq!(filing.reporting_date, NaiveDate::from_ymd_opt(2022, 6, 30));
        assert_eq!(filing.reporting_date, filing.last_end_date);
    }

    #[test]
    fn language_from_report_url_when_package_has_none() {
        let mut json = asml_json();
        json["attributes"]["package_url"] = json!("/lei/2022-12-31/ESEF/NL/0/package.zip");
        let (fields, _) = fields(&json);
        let filing = Filing::link(fields, LinkCandidates::default(), &mut Vec::new());
        assert_eq!(filing.language.as_deref(), Some("en"));
    }

    #[test]
    fn dangling_entity_reference_warns() {
        let (fields, _) = fields(&asml_json());
        let entities = HashMap::new();
        let messages = HashMap::new();
        let mut warnings = Vec::new();
        let filing = Filing::link(
            fields,
            LinkCandidates {
                entities: Some(&entities),
                messages: Some(&messages),
            },
            &mut warnings,
        );
        assert!(filing.entity().is_none());
        assert_eq!(filing.validation_messages().map(|m| m.len()), Some(0));
        let entity_warnings = warnings
            .iter()
            .filter(|w| w.message.starts_with("Entity with api_id=1969 not found"))
            .count();
        assert_eq!(entity_warnings, 1);
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().all(|w| w.kind == WarningKind::Reference));
    }

    #[test]
    fn missing_entity_id_warns_differently() {
        let mut json = asml_json();
        json["relationships"]
            .as_object_mut()
            .unwrap()
            .remove("entity");
        let (fields, _) = fields(&json);
        let entities = HashMap::new();
        let mut warnings = Vec::new();
        let filing = Filing::link(
            fields,
            LinkCandidates {
                entities: Some(&entities),
                messages: None,
            },
            &mut warnings,
        );
        assert!(filing.entity().is_none());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.starts_with("No entity defined"));
    }

    #[test]
    fn links_are_bidirectional() {
        let settings = ParseSettings::default();
        let req = request();
        let (entity, _) = Entity::from_json(
            "1969",
            &json!({"attributes": {"name": "ASML Holding N.V."}}),
            &req,
            &settings,
        )
        .unwrap();
        let (msg, _) = ValidationMessage::from_json(
            "66611",
            &json!({"attributes": {"code": "message:positive", "message": "m"}}),
            &req,
            &settings,
        )
        .unwrap();
        let entities = HashMap::from([("1969".to_string(), Arc::new(entity))]);
        let messages = HashMap::from([("66611".to_string(), Arc::new(msg))]);

        let (fields, _) = fields(&asml_json());
        let mut warnings = Vec::new();
        let filing = Filing::link(
            fields,
            LinkCandidates {
                entities: Some(&entities),
                messages: Some(&messages),
            },
            &mut warnings,
        );

        assert_eq!(warnings.len(), 1, "message 66612 is missing");
        let entity = filing.entity().unwrap();
        assert!(Arc::ptr_eq(entity, &entities["1969"]));
        assert!(Arc::ptr_eq(&entity.filings()[0], &filing));
        let message = &messages["66611"];
        assert!(Arc::ptr_eq(&message.filing().unwrap(), &filing));
        assert_eq!(message.filing_api_id().as_deref(), Some("4261"));
        assert_eq!(filing.to_string(), "ASML Holding N.V. 2022 [en]");

        filing.detach_from_entity();
        assert!(entity.filings().is_empty());
    }

    #[test]
    fn deep_copy_is_a_new_graph() {
        let (fields, _) = fields(&asml_json());
        let messages = HashMap::new();
        let original = Filing::link(
            fields,
            LinkCandidates {
                entities: None,
                messages: Some(&messages),
            },
            &mut Vec::new(),
        );
        let copy = original.deep_copy(None);
        assert_eq!(*copy, *original);
        assert!(!Arc::ptr_eq(&copy, &original));
        assert_eq!(copy.added_time, original.added_time);
    }
}
