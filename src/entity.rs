use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::error::Result;
use super::export::columns::{DataRecord, DataValue};
use super::filing::Filing;
use super::parsing::{FieldPathReader, ParseSettings};
use super::resource::{RequestInfo, ResourceKind};
use super::warning::ApiWarning;

const IDENTIFIER: &str = "attributes.identifier";
const NAME: &str = "attributes.name";
const FILINGS_URL: &str = "relationships.filings.links.related";

/// The issuer of filings.
///
/// An entity keeps weak back-references to the filings which refer to
/// it. They are set when filings of the same query resolve their entity.
#[derive(Debug)]
pub struct Entity {
    pub api_id: String,
    /// Identifier of the entity, usually its LEI code
    pub identifier: Option<String>,
    pub name: Option<String>,
    /// API URL listing the filings of this entity
    pub api_entity_filings_url: Option<String>,
    pub request_url: String,
    pub request_time: DateTime<FixedOffset>,
    filings: Mutex<Vec<Weak<Filing>>>,
}

impl Entity {
    pub const KIND: ResourceKind = ResourceKind::Entity;

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
        let identifier = reader.get_str(IDENTIFIER);
        let name = reader.get_str(NAME);
        let api_entity_filings_url = reader.get_url(FILINGS_URL);
        let warnings = reader.close()?;

        Ok((
            Self {
                api_id: api_id.to_string(),
                identifier,
                name,
                api_entity_filings_url,
                request_url: request.url.clone(),
                request_time: request.time,
                filings: Mutex::new(Vec::new()),
            },
            warnings,
        ))
    }

    fn filing_refs(&self) -> MutexGuard<'_, Vec<Weak<Filing>>> {
        self.filings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Filings referring to this entity that are still alive.
    pub fn filings(&self) -> Vec<Arc<Filing>> {
        self.filing_refs().iter().filter_map(Weak::upgrade).collect()
    }

    pub fn filing_count(&self) -> usize {
        self.filing_refs()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub(crate) fn attach_filing(&self, filing: Weak<Filing>) {
        let mut refs = self.filing_refs();
        if !refs.iter().any(|w| Weak::ptr_eq(w, &filing)) {
            refs.push(filing);
        }
    }

    /// Removes `filing` from the back-references. Compared by identity.
    pub(crate) fn detach_filing(&self, filing: &Filing) {
        self.filing_refs()
            .retain(|w| !std::ptr::eq(w.as_ptr(), filing) && w.strong_count() > 0);
    }

    /// Copy without back-references.
    pub(crate) fn copy_detached(&self) -> Self {
        Self {
            api_id: self.api_id.clone(),
            identifier: self.identifier.clone(),
            name: self.name.clone(),
            api_entity_filings_url: self.api_entity_filings_url.clone(),
            request_url: self.request_url.clone(),
            request_time: self.request_time,
            filings: Mutex::new(Vec::new()),
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.api_id == other.api_id
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Self::KIND.type_tag().hash(state);
        self.api_id.hash(state);
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, &self.identifier) {
            (Some(name), Some(identifier)) => write!(f, "{name} ({identifier})"),
            (Some(name), None) => f.write_str(name),
            (None, Some(identifier)) => f.write_str(identifier),
            (None, None) => Ok(()),
        }
    }
}

impl DataRecord for Entity {
    const CLASS_NAME: &'static str = "Entity";

    fn data_attributes() -> &'static [&'static str] {
        &[
            "api_id",
            "identifier",
            "name",
            "api_entity_filings_url",
            "request_time",
            "request_url",
        ]
    }

    fn data_value(&self, attr: &str) -> Option<DataValue> {
        let value = match attr {
            "api_id" => DataValue::Text(self.api_id.clone()),
            "identifier" => self.identifier.clone().into(),
            "name" => self.name.clone().into(),
            "api_entity_filings_url" => self.api_entity_filings_url.clone().into(),
            "request_time" => DataValue::DateTime(self.request_time),
            "request_url" => DataValue::Text(self.request_url.clone()),
            _ => return None,
        };
        Some(value)
    }
}
