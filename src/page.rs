//! One page of a filings query and its reconciliation with earlier pages.

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::entity::Entity;
use super::error::Result;
use super::filing::{Filing, FilingFields, LinkCandidates};
use super::options::ScopeFlags;
use super::parsing::json_tree::record_unexpected_type;
use super::parsing::{FieldPathReader, ParseSettings};
use super::resource::{RequestInfo, ResourceKind};
use super::validation_message::ValidationMessage;
use super::warning::{ApiWarning, WarningKind};

const PAGE_CLASS: &str = "FilingsPage";

/// Pagination links of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLinks {
    pub self_url: Option<String>,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
    pub first_url: Option<String>,
    pub last_url: Option<String>,
}

/// State carried from page to page within one query call.
///
/// Records of later pages may refer to entities and validation messages
/// that arrived on earlier pages, and the API may return the same filing
/// on several pages.
#[derive(Debug, Default)]
pub(crate) struct ReconcileState {
    pub received_filings: HashSet<String>,
    pub entities: HashMap<String, Arc<Entity>>,
    pub messages: HashMap<String, Arc<ValidationMessage>>,
}

/// A page of filings with the side records first seen on it.
#[derive(Debug)]
pub struct FilingsPage {
    /// Number of filings matching the request over all pages.
    pub query_filing_count: Option<i64>,
    pub filing_list: Vec<Arc<Filing>>,
    /// Entities first seen on this page. `None` if not requested.
    pub entity_list: Option<Vec<Arc<Entity>>>,
    /// Validation messages first seen on this page. `None` if not requested.
    pub validation_message_list: Option<Vec<Arc<ValidationMessage>>>,
    pub links: PageLinks,
    pub jsonapi_version: Option<String>,
    pub request_url: String,
    pub request_time: DateTime<FixedOffset>,
    pub warnings: Vec<ApiWarning>,
}

fn item_type(item: &Value) -> Option<&str> {
    item.get("type").and_then(Value::as_str)
}

/// Warns once per page for each unknown type tag and origin.
fn warn_unexpected_type(
    warnings: &mut Vec<ApiWarning>,
    warned: &mut HashSet<(String, &'static str)>,
    type_tag: &str,
    origin: &'static str,
) {
    if warned.insert((type_tag.to_string(), origin)) {
        warnings.push(ApiWarning::new(
            WarningKind::UnexpectedResourceType,
            format!("Unexpected resource type \"{type_tag}\" in {origin}"),
        ));
    }
}

fn item_id(item: &Value) -> Option<String> {
    match item.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

impl FilingsPage {
    /// Parses a response document and links its records to each other and
    /// to the records of earlier pages held in `state`.
    pub(crate) fn parse(
        json: &Value,
        flags: ScopeFlags,
        request: RequestInfo,
        settings: &ParseSettings,
        state: &mut ReconcileState,
    ) -> Result<Self> {
        let mut reader = FieldPathReader::new(PAGE_CLASS, json, settings);
        let query_filing_count = reader.get_i64("meta.count");
        let links = PageLinks {
            self_url: reader.get_url("links.self"),
            prev_url: reader.get_url("links.prev"),
            next_url: reader.get_url("links.next"),
            first_url: reader.get_url("links.first"),
            last_url: reader.get_url("links.last"),
        };
        let jsonapi_version = reader.get_str("jsonapi.version");
        let data = reader.get("data");
        let included = reader.get("included");
        let mut warnings = reader.close()?;

        let mut entity_list = flags.entities().then(Vec::new);
        let mut message_list = flags.validation_messages().then(Vec::new);
        let mut residual: Vec<String> = Vec::new();
        let mut warned_types = HashSet::new();

        for item in included.as_ref().and_then(Value::as_array).into_iter().flatten() {
            let Some(type_tag) = item_type(item) else {
                continue;
            };
            let id = item_id(item);
            match (ResourceKind::from_type_tag(type_tag), id) {
                (Some(ResourceKind::Entity), Some(id)) if flags.entities() => {
                    if state.entities.contains_key(&id) {
                        continue;
                    }
                    let (entity, entity_warnings) =
                        Entity::from_json(&id, item, &request, settings)?;
                    warnings.extend(entity_warnings);
                    let entity = Arc::new(entity);
                    state.entities.insert(id, entity.clone());
                    if let Some(list) = entity_list.as_mut() {
                        list.push(entity);
                    }
                }
                (Some(ResourceKind::ValidationMessage), Some(id)) if flags.validation_messages() => {
                    if state.messages.contains_key(&id) {
                        continue;
                    }
                    let (message, message_warnings) =
                        ValidationMessage::from_json(&id, item, &request, settings)?;
                    warnings.extend(message_warnings);
                    let message = Arc::new(message);
                    state.messages.insert(id, message.clone());
                    if let Some(list) = message_list.as_mut() {
                        list.push(message);
                    }
                }
                _ => residual.push(type_tag.to_string()),
            }
        }

        let mut filing_list = Vec::new();
        for item in data.as_ref().and_then(Value::as_array).into_iter().flatten() {
            let type_tag = item_type(item).unwrap_or_default();
            if type_tag != Filing::KIND.type_tag() {
                record_unexpected_type(type_tag, "data");
                warn_unexpected_type(&mut warnings, &mut warned_types, type_tag, "data");
                continue;
            }
            let Some(id) = item_id(item) else {
                continue;
            };
            if !state.received_filings.insert(id.clone()) {
                warnings.push(ApiWarning::new(
                    WarningKind::IdCoherence,
                    format!("Filing api_id={id} was returned again in the same query"),
                ));
                continue;
            }
            let (fields, mut filing_warnings) =
                FilingFields::from_json(&id, item, &request, settings)?;
            let candidates = LinkCandidates {
                entities: flags.entities().then_some(&state.entities),
                messages: flags.validation_messages().then_some(&state.messages),
            };
            filing_list.push(Filing::link(fields, candidates, &mut filing_warnings));
            warnings.extend(filing_warnings.into_iter().map(|w| w.for_filing(&id)));
        }

        for type_tag in residual {
            record_unexpected_type(&type_tag, "included");
            // known kinds left out by the scope flags are expected
            if ResourceKind::from_type_tag(&type_tag).is_none() {
                warn_unexpected_type(&mut warnings, &mut warned_types, &type_tag, "included");
            }
        }

        for message in message_list.iter().flatten() {
            if !message.has_filing() {
                warnings.push(ApiWarning::new(
                    WarningKind::Reference,
                    format!(
                        "Validation message api_id={} is not referenced by any filing",
                        message.api_id
                    ),
                ));
            }
        }

        Ok(Self {
            query_filing_count,
            filing_list,
            entity_list,
            validation_message_list: message_list,
            links,
            jsonapi_version,
            request_url: request.url,
            request_time: request.time,
            warnings,
        })
    }

    /// Keeps the first `keep` filings. The dropped filings are detached
    /// from their entities, and entities, messages and warnings only they
    /// referred to leave the page.
    pub(crate) fn truncate(&mut self, keep: usize) {
        if self.filing_list.len() <= keep {
            return;
        }
        let cut = self.filing_list.split_off(keep);
        for filing in &cut {
            filing.detach_from_entity();
        }
        self.warnings.retain(|warning| match &warning.filing_api_id {
            Some(id) => !cut.iter().any(|f| f.api_id == *id),
            None => true,
        });

        if let Some(entities) = self.entity_list.as_mut() {
            entities.retain(|entity| {
                let orphaned = cut
                    .iter()
                    .filter_map(|f| f.entity())
                    .any(|e| Arc::ptr_eq(e, entity))
                    && entity.filing_count() == 0;
                !orphaned
            });
        }

        if let Some(messages) = self.validation_message_list.as_mut() {
            messages.retain(|message| {
                !cut.iter()
                    .filter_map(|f| f.validation_messages())
                    .flatten()
                    .any(|m| Arc::ptr_eq(m, message))
            });
        }
    }

    pub fn filing_count(&self) -> usize {
        self.filing_list.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn request() -> RequestInfo {
        RequestInfo {
            url: "https://filings.xbrl.org/api/filings?page%5Bsize%5D=2".to_string(),
            time: Utc::now().fixed_offset(),
        }
    }

    fn filing_item(id: &str, entity_id: &str, message_ids: &[&str]) -> Value {
        json!({
            "type": "filing",
            "id": id,
            "attributes": {
                "country": "FI",
                "fxo_id": format!("lei{entity_id}-2023-12-31-ESEF-FI-0"),
                "period_end": "2023-12-31",
                "package_url": format!("/lei{entity_id}/2023-12-31/ESEF/FI/0/report-{id}-2023-12-31-fi.zip")
            },
            "relationships": {
                "entity": {"data": {"type": "entity", "id": entity_id}},
                "validation_messages": {
                    "data": message_ids
                        .iter()
                        .map(|m| json!({"type": "validation_message", "id": m}))
                        .collect::<Vec<_>>()
                }
            }
        })
    }

    fn entity_item(id: &str) -> Value {
        json!({"type": "entity", "id": id, "attributes": {"name": format!("Entity {id}")}})
    }

    fn message_item(id: &str) -> Value {
        json!({
            "type": "validation_message",
            "id": id,
            "attributes": {"code": "message:positive", "message": "m", "severity": "warning"}
        })
    }

    fn all_flags() -> ScopeFlags {
        ScopeFlags::GET_ENTITY | ScopeFlags::GET_VALIDATION_MESSAGES
    }

    #[test]
    fn parse_links_records_on_the_page() {
        let doc = json!({
            "data": [filing_item("1", "10", &["100", "101"]), filing_item("2", "10", &[])],
            "included": [entity_item("10"), message_item("100"), message_item("101")],
            "links": {"next": "/api/filings?page%5Bnumber%5D=2"},
            "meta": {"count": 7},
            "jsonapi": {"version": "1.0"}
        });
        let mut state = ReconcileState::default();
        let page = FilingsPage::parse(&doc, all_flags(), request(), &ParseSettings::default(), &mut state)
            .unwrap();

        assert!(page.warnings.is_empty(), "{:?}", page.warnings);
        assert_eq!(page.query_filing_count, Some(7));
        assert_eq!(page.jsonapi_version.as_deref(), Some("1.0"));
        assert_eq!(
            page.links.next_url.as_deref(),
            Some("https://filings.xbrl.org/api/filings?page%5Bnumber%5D=2")
        );
        assert_eq!(page.filing_count(), 2);
        let entities = page.entity_list.as_ref().unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].filing_count(), 2);
        let first = &page.filing_list[0];
        assert!(Arc::ptr_eq(first.entity().unwrap(), &entities[0]));
        assert_eq!(first.validation_messages().unwrap().len(), 2);
    }

    #[test]
    fn side_records_from_earlier_pages_are_candidates() {
        let settings = ParseSettings::default();
        let mut state = ReconcileState::default();
        let page1 = json!({
            "data": [filing_item("1", "10", &[])],
            "included": [entity_item("10")]
        });
        let page2 = json!({"data": [filing_item("2", "10", &[])], "included": []});
        let first = FilingsPage::parse(&page1, all_flags(), request(), &settings, &mut state).unwrap();
        let second = FilingsPage::parse(&page2, all_flags(), request(), &settings, &mut state).unwrap();

        assert!(second.warnings.is_empty());
        assert_eq!(second.entity_list.as_ref().map(Vec::len), Some(0));
        let entity = &first.entity_list.as_ref().unwrap()[0];
        assert!(Arc::ptr_eq(second.filing_list[0].entity().unwrap(), entity));
        assert_eq!(entity.filing_count(), 2);
    }

    #[test]
    fn repeated_filing_is_dropped_with_warning() {
        let settings = ParseSettings::default();
        let mut state = ReconcileState::default();
        let doc = json!({"data": [filing_item("1", "10", &[]), filing_item("1", "10", &[])]});
        let page = FilingsPage::parse(&doc, ScopeFlags::default(), request(), &settings, &mut state)
            .unwrap();
        assert_eq!(page.filing_count(), 1);
        assert_eq!(page.warnings.len(), 1);
        assert_eq!(page.warnings[0].kind, WarningKind::IdCoherence);
        assert!(page.entity_list.is_none());
        assert!(page.filing_list[0].entity().is_none());
    }

    #[test]
    fn dangling_entity_does_not_fail_the_page() {
        let settings = ParseSettings::default();
        let mut state = ReconcileState::default();
        let doc = json!({"data": [filing_item("1", "99", &[])], "included": []});
        let page = FilingsPage::parse(&doc, ScopeFlags::GET_ENTITY, request(), &settings, &mut state)
            .unwrap();
        assert_eq!(page.filing_count(), 1);
        assert!(page.filing_list[0].entity().is_none());
        let reference = page
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::Reference)
            .count();
        assert_eq!(reference, 1);
    }

    #[test]
    fn unreferenced_message_warns() {
        let settings = ParseSettings::default();
        let mut state = ReconcileState::default();
        let doc = json!({
            "data": [filing_item("1", "10", &[])],
            "included": [message_item("500")]
        });
        let page = FilingsPage::parse(
            &doc,
            ScopeFlags::GET_VALIDATION_MESSAGES,
            request(),
            &settings,
            &mut state,
        )
        .unwrap();
        assert_eq!(page.validation_message_list.as_ref().map(Vec::len), Some(1));
        assert_eq!(page.warnings.len(), 1);
        assert!(page.warnings[0].message.contains("api_id=500"));
    }

    #[test]
    fn unexpected_types_are_recorded() {
        let settings = ParseSettings::default();
        let mut state = ReconcileState::default();
        let doc = json!({
            "data": [{"type": "unit_test_report", "id": "1"}, filing_item("2", "10", &[])],
            "included": [{"type": "unit_test_extra", "id": "3"}, entity_item("10")]
        });
        let page = FilingsPage::parse(&doc, ScopeFlags::default(), request(), &settings, &mut state)
            .unwrap();
        assert_eq!(page.filing_count(), 1);
        let unexpected = crate::parsing::json_tree::unexpected_resource_types();
        assert!(unexpected.contains(&("unit_test_report".to_string(), "data".to_string())));
        assert!(unexpected.contains(&("unit_test_extra".to_string(), "included".to_string())));
        assert!(unexpected.contains(&("entity".to_string(), "included".to_string())));

        let kinds = page.warnings.iter().map(|w| w.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            [WarningKind::UnexpectedResourceType, WarningKind::UnexpectedResourceType]
        );
        assert!(page.warnings[0].message.contains("unit_test_report"));
        assert!(page.warnings[1].message.contains("unit_test_extra"));
    }

    #[test]
    fn truncate_drops_warnings_of_cut_filings() {
        let settings = ParseSettings::default();
        let mut state = ReconcileState::default();
        let doc = json!({
            "data": [filing_item("1", "10", &[]), filing_item("2", "404", &[])],
            "included": [entity_item("10")]
        });
        let mut page =
            FilingsPage::parse(&doc, ScopeFlags::GET_ENTITY, request(), &settings, &mut state)
                .unwrap();
        assert_eq!(page.warnings.len(), 1);
        assert_eq!(page.warnings[0].filing_api_id.as_deref(), Some("2"));

        page.truncate(1);
        assert!(page.warnings.is_empty());
    }

    #[test]
    fn truncate_detaches_cut_filings() {
        let settings = ParseSettings::default();
        let mut state = ReconcileState::default();
        let doc = json!({
            "data": [
                filing_item("1", "10", &["100"]),
                filing_item("2", "10", &["101"]),
                filing_item("3", "11", &["102"])
            ],
            "included": [
                entity_item("10"), entity_item("11"),
                message_item("100"), message_item("101"), message_item("102")
            ]
        });
        let mut page = FilingsPage::parse(&doc, all_flags(), request(), &settings, &mut state).unwrap();
        page.truncate(1);

        assert_eq!(page.filing_count(), 1);
        let entities = page.entity_list.as_ref().unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].api_id, "10");
        assert_eq!(entities[0].filing_count(), 1);
        let messages = page.validation_message_list.as_ref().unwrap();
        assert_eq!(
            messages.iter().map(|m| m.api_id.as_str()).collect::<Vec<_>>(),
            vec!["100"]
        );
    }
}
