//! Shared pieces of the three resource types.

use chrono::{DateTime, FixedOffset};
use std::fmt;
use std::sync::Arc;

use super::entity::Entity;
use super::filing::Filing;
use super::validation_message::ValidationMessage;

/// Kind of a JSON:API resource handled by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Filing,
    Entity,
    ValidationMessage,
}

impl ResourceKind {
    /// The `type` member of the resource object.
    pub fn type_tag(&self) -> &'static str {
        match self {
            ResourceKind::Filing => "filing",
            ResourceKind::Entity => "entity",
            ResourceKind::ValidationMessage => "validation_message",
        }
    }

    /// Name used for access statistics and SQLite tables.
    pub fn class_name(&self) -> &'static str {
        match self {
            ResourceKind::Filing => "Filing",
            ResourceKind::Entity => "Entity",
            ResourceKind::ValidationMessage => "ValidationMessage",
        }
    }

    pub fn from_type_tag(tag: &str) -> Option<Self> {
        match tag {
            "filing" => Some(ResourceKind::Filing),
            "entity" => Some(ResourceKind::Entity),
            "validation_message" => Some(ResourceKind::ValidationMessage),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

/// The request a resource was received in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    /// URL actually requested, including query parameters.
    pub url: String,
    /// Time of the query call. Shared by every page of one call.
    pub time: DateTime<FixedOffset>,
}

/// Any resource. Used to build a `FilingSet` from mixed input.
#[derive(Debug, Clone)]
pub enum AnyResource {
    Filing(Arc<Filing>),
    Entity(Arc<Entity>),
    ValidationMessage(Arc<ValidationMessage>),
}

impl AnyResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            AnyResource::Filing(_) => ResourceKind::Filing,
            AnyResource::Entity(_) => ResourceKind::Entity,
            AnyResource::ValidationMessage(_) => ResourceKind::ValidationMessage,
        }
    }

    pub fn api_id(&self) -> &str {
        match self {
            AnyResource::Filing(f) => &f.api_id,
            AnyResource::Entity(e) => &e.api_id,
            AnyResource::ValidationMessage(m) => &m.api_id,
        }
    }
}

impl From<Arc<Filing>> for AnyResource {
    fn from(filing: Arc<Filing>) -> Self {
        AnyResource::Filing(filing)
    }
}

impl From<Arc<Entity>> for AnyResource {
    fn from(entity: Arc<Entity>) -> Self {
        AnyResource::Entity(entity)
    }
}

impl From<Arc<ValidationMessage>> for AnyResource {
    fn from(message: Arc<ValidationMessage>) -> Self {
        AnyResource::ValidationMessage(message)
    }
}
