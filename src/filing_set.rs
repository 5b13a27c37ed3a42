//! A set of filings with set algebra and views of their side records.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::{
    BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Sub, SubAssign,
};
use std::sync::Arc;

use super::entity::Entity;
use super::error::{Result, XbrlError};
use super::export::columns::{
    ColumnOptions, DataColumns, DataRecord, DataValue, data_columns, default_columns,
};
use super::filing::Filing;
use super::resource::AnyResource;
use super::validation_message::ValidationMessage;

#[cfg(feature = "sqlite")]
use super::config::XbrlConfig;
#[cfg(feature = "sqlite")]
use super::export::sqlite::SqliteExport;
#[cfg(feature = "sqlite")]
use super::options::ScopeFlags;
#[cfg(feature = "sqlite")]
use std::path::Path;

const ENTITY_PREFIX: &str = "entity.";

/// Filings keyed by `api_id`.
///
/// Operations producing a new set (`union`, `|` and the like) copy every
/// filing, entity and validation message of both operands, so the result
/// shares no objects with them. Operations updating a set in place
/// (`update`, `|=` and the like) keep the objects of the receiver and copy
/// only those taken from the other set.
#[derive(Default, Clone)]
pub struct FilingSet {
    filings: HashMap<String, Arc<Filing>>,
}

/// Copies `filings` into `target`, linking the copies to entities of
/// `entities` by id and adding copies of missing entities to it.
fn copy_into<'a, I>(
    target: &mut HashMap<String, Arc<Filing>>,
    entities: &mut HashMap<String, Arc<Entity>>,
    filings: I,
) where
    I: IntoIterator<Item = &'a Arc<Filing>>,
{
    for filing in filings {
        if target.contains_key(&filing.api_id) {
            continue;
        }
        let entity = filing.entity().map(|e| {
            entities
                .entry(e.api_id.clone())
                .or_insert_with(|| Arc::new(e.copy_detached()))
                .clone()
        });
        target.insert(filing.api_id.clone(), filing.deep_copy(entity));
    }
}

impl FilingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from mixed resources. The filings are shared, not
    /// copied.
    ///
    /// # Errors
    ///
    /// `XbrlError::NotAFiling` if any resource is not a filing.
    pub fn try_from_resources(resources: Vec<AnyResource>) -> Result<Self> {
        let mut set = Self::new();
        for resource in resources {
            match resource {
                AnyResource::Filing(filing) => set.insert_shared(filing),
                other => {
                    return Err(XbrlError::NotAFiling(format!(
                        "{} api_id={}",
                        other.kind().class_name(),
                        other.api_id()
                    )));
                }
            }
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.filings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filings.is_empty()
    }

    pub fn contains(&self, filing: &Filing) -> bool {
        self.filings.contains_key(&filing.api_id)
    }

    pub fn get(&self, api_id: &str) -> Option<&Arc<Filing>> {
        self.filings.get(api_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Filing>> {
        self.filings.values()
    }

    /// Inserts `filing` itself without copying. Keeps an existing filing
    /// with the same id.
    pub(crate) fn insert_shared(&mut self, filing: Arc<Filing>) {
        self.filings.entry(filing.api_id.clone()).or_insert(filing);
    }

    fn entity_map(&self) -> HashMap<String, Arc<Entity>> {
        self.entities()
            .iter()
            .map(|e| (e.api_id.clone(), e))
            .collect()
    }

    /// Adds a copy of `filing` unless a filing with the same id is
    /// present. The copy is linked to a same-id entity of this set if
    /// there is one. Returns whether the filing was added.
    pub fn add(&mut self, filing: &Arc<Filing>) -> bool {
        if self.filings.contains_key(&filing.api_id) {
            return false;
        }
        let mut entities = self.entity_map();
        copy_into(&mut self.filings, &mut entities, [filing]);
        true
    }

    /// Same as [`FilingSet::add`].
    pub fn insert(&mut self, filing: &Arc<Filing>) -> bool {
        self.add(filing)
    }

    /// Removes the filing with the id of `filing`.
    ///
    /// # Errors
    ///
    /// `XbrlError::NotFound` if there is no such filing.
    pub fn remove(&mut self, filing: &Filing) -> Result<Arc<Filing>> {
        self.discard(filing)
            .ok_or_else(|| XbrlError::NotFound(format!("Filing api_id={}", filing.api_id)))
    }

    /// Removes the filing with the id of `filing` if present.
    pub fn discard(&mut self, filing: &Filing) -> Option<Arc<Filing>> {
        let removed = self.filings.remove(&filing.api_id)?;
        removed.detach_from_entity();
        Some(removed)
    }

    /// Removes and returns an arbitrary filing.
    pub fn pop(&mut self) -> Option<Arc<Filing>> {
        let key = self.filings.keys().next()?.clone();
        let removed = self.filings.remove(&key)?;
        removed.detach_from_entity();
        Some(removed)
    }

    pub fn clear(&mut self) {
        for (_, filing) in self.filings.drain() {
            filing.detach_from_entity();
        }
    }

    /// Shallow copy sharing the filing objects.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    fn ids(&self) -> HashSet<&str> {
        self.filings.keys().map(String::as_str).collect()
    }

    fn build<'a, I>(filings: I) -> Self
    where
        I: IntoIterator<Item = &'a Arc<Filing>>,
    {
        let mut set = Self::new();
        let mut entities = HashMap::new();
        copy_into(&mut set.filings, &mut entities, filings);
        set
    }

    pub fn union(&self, other: &FilingSet) -> FilingSet {
        Self::build(self.iter().chain(other.iter()))
    }

    pub fn intersection(&self, other: &FilingSet) -> FilingSet {
        Self::build(self.iter().filter(|f| other.contains(f)))
    }

    pub fn difference(&self, other: &FilingSet) -> FilingSet {
        Self::build(self.iter().filter(|f| !other.contains(f)))
    }

    pub fn symmetric_difference(&self, other: &FilingSet) -> FilingSet {
        Self::build(
            self.iter()
                .filter(|f| !other.contains(f))
                .chain(other.iter().filter(|f| !self.contains(f))),
        )
    }

    /// Adds copies of the filings of `other` which are not in this set.
    pub fn update(&mut self, other: &FilingSet) {
        let mut entities = self.entity_map();
        copy_into(&mut self.filings, &mut entities, other.iter());
    }

    pub fn intersection_update(&mut self, other: &FilingSet) {
        let gone = self
            .filings
            .keys()
            .filter(|id| !other.filings.contains_key(*id))
            .cloned()
            .collect::<Vec<_>>();
        self.remove_ids(&gone);
    }

    pub fn difference_update(&mut self, other: &FilingSet) {
        let gone = self
            .filings
            .keys()
            .filter(|id| other.filings.contains_key(*id))
            .cloned()
            .collect::<Vec<_>>();
        self.remove_ids(&gone);
    }

    pub fn symmetric_difference_update(&mut self, other: &FilingSet) {
        let common = self
            .filings
            .keys()
            .filter(|id| other.filings.contains_key(*id))
            .cloned()
            .collect::<Vec<_>>();
        let incoming = other
            .iter()
            .filter(|f| !self.contains(f))
            .collect::<Vec<_>>();
        self.remove_ids(&common);
        let mut entities = self.entity_map();
        copy_into(&mut self.filings, &mut entities, incoming);
    }

    fn remove_ids(&mut self, ids: &[String]) {
        for id in ids {
            if let Some(removed) = self.filings.remove(id) {
                removed.detach_from_entity();
            }
        }
    }

    pub fn is_disjoint(&self, other: &FilingSet) -> bool {
        self.ids().is_disjoint(&other.ids())
    }

    pub fn is_subset(&self, other: &FilingSet) -> bool {
        self.ids().is_subset(&other.ids())
    }

    pub fn is_superset(&self, other: &FilingSet) -> bool {
        self.ids().is_superset(&other.ids())
    }

    /// Entities of the filings, each once.
    pub fn entities(&self) -> EntityView<'_> {
        EntityView { set: self }
    }

    /// Validation messages of the filings, each once.
    pub fn validation_messages(&self) -> MessageView<'_> {
        MessageView { set: self }
    }

    /// Columns of the filings for building a data frame.
    ///
    /// `attr_names` selects and orders the columns explicitly; names
    /// prefixed with `entity.` read attributes of the entity. Without it,
    /// the default columns of [`ColumnOptions`] are used.
    pub fn get_data_columns(
        &self,
        attr_names: Option<&[String]>,
        options: &ColumnOptions,
    ) -> DataColumns {
        let names = match attr_names {
            Some(names) => names.to_vec(),
            None => {
                let mut names = default_columns::<Filing>(options);
                if options.with_entity {
                    names.retain(|n| n != "entity_api_id");
                    names.extend(
                        default_columns::<Entity>(options)
                            .into_iter()
                            .filter(|n| !n.starts_with("request_"))
                            .map(|n| format!("{ENTITY_PREFIX}{n}")),
                    );
                }
                names
            }
        };

        let mut filings = self.filings.values().map(Arc::as_ref).collect::<Vec<&Filing>>();
        filings.sort_by(|a, b| a.api_id.cmp(&b.api_id));

        let (entity_names, filing_names): (Vec<String>, Vec<String>) = names
            .iter()
            .cloned()
            .partition(|n| n.starts_with(ENTITY_PREFIX));
        let mut filing_cols =
            data_columns::<Filing, _>(filings.iter().copied(), &filing_names, options);
        let entity_cols = entity_names.into_iter().map(|name| {
            let attr = &name[ENTITY_PREFIX.len()..];
            let values = filings
                .iter()
                .map(|f| {
                    let value = f
                        .entity()
                        .and_then(|e| e.data_value(attr))
                        .unwrap_or(DataValue::Null);
                    options.convert(value)
                })
                .collect::<Vec<_>>();
            (name, values)
        });
        filing_cols.extend(entity_cols);

        // restore the requested column order
        names
            .iter()
            .filter_map(|name| {
                let pos = filing_cols.iter().position(|(n, _)| n == name)?;
                Some(filing_cols.swap_remove(pos))
            })
            .collect()
    }

    /// Writes the filings and their side records into an SQLite database.
    ///
    /// Entities and validation messages are written if any filing has
    /// them.
    #[cfg(feature = "sqlite")]
    pub fn to_sqlite(&self, path: impl AsRef<Path>, update: bool, config: &XbrlConfig) -> Result<()> {
        let mut flags = ScopeFlags::empty();
        if self.iter().any(|f| f.entity().is_some()) {
            flags |= ScopeFlags::GET_ENTITY;
        }
        if self.iter().any(|f| f.validation_messages().is_some()) {
            flags |= ScopeFlags::GET_VALIDATION_MESSAGES;
        }
        if flags.is_empty() {
            flags = ScopeFlags::GET_ONLY_FILINGS;
        }
        let mut export = SqliteExport::open(path.as_ref(), update, flags, config)?;
        export.write_filings(self.iter())
    }
}

impl fmt::Debug for FilingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids = self.filings.keys().collect::<Vec<_>>();
        ids.sort();
        f.debug_struct("FilingSet").field("filings", &ids).finish()
    }
}

impl PartialEq for FilingSet {
    fn eq(&self, other: &Self) -> bool {
        self.ids() == other.ids()
    }
}

impl Eq for FilingSet {}

impl FromIterator<Arc<Filing>> for FilingSet {
    fn from_iter<T: IntoIterator<Item = Arc<Filing>>>(iter: T) -> Self {
        let mut set = Self::new();
        for filing in iter {
            set.insert_shared(filing);
        }
        set
    }
}

impl Extend<Arc<Filing>> for FilingSet {
    fn extend<T: IntoIterator<Item = Arc<Filing>>>(&mut self, iter: T) {
        for filing in iter {
            self.insert_shared(filing);
        }
    }
}

impl<'a> IntoIterator for &'a FilingSet {
    type Item = &'a Arc<Filing>;
    type IntoIter = std::collections::hash_map::Values<'a, String, Arc<Filing>>;

    fn into_iter(self) -> Self::IntoIter {
        self.filings.values()
    }
}

macro_rules! set_operator {
    ($op:ident, $method:ident, $set_fn:ident, $assign:ident, $assign_method:ident, $update_fn:ident) => {
        impl $op<&FilingSet> for &FilingSet {
            type Output = FilingSet;

            fn $method(self, rhs: &FilingSet) -> FilingSet {
                self.$set_fn(rhs)
            }
        }

        impl $assign<&FilingSet> for FilingSet {
            fn $assign_method(&mut self, rhs: &FilingSet) {
                self.$update_fn(rhs);
            }
        }
    };
}

set_operator!(BitOr, bitor, union, BitOrAssign, bitor_assign, update);
set_operator!(BitAnd, bitand, intersection, BitAndAssign, bitand_assign, intersection_update);
set_operator!(Sub, sub, difference, SubAssign, sub_assign, difference_update);
set_operator!(
    BitXor,
    bitxor,
    symmetric_difference,
    BitXorAssign,
    bitxor_assign,
    symmetric_difference_update
);

/// Entities reachable from the filings of a set.
#[derive(Debug, Clone, Copy)]
pub struct EntityView<'a> {
    set: &'a FilingSet,
}

impl<'a> EntityView<'a> {
    pub fn iter(&self) -> impl Iterator<Item = Arc<Entity>> + 'a {
        let mut seen = HashSet::new();
        self.set
            .filings
            .values()
            .filter_map(|f| f.entity())
            .filter(move |e| seen.insert(e.api_id.clone()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn exists(&self, api_id: &str) -> bool {
        self.iter().any(|e| e.api_id == api_id)
    }
}

/// Validation messages reachable from the filings of a set.
#[derive(Debug, Clone, Copy)]
pub struct MessageView<'a> {
    set: &'a FilingSet,
}

impl<'a> MessageView<'a> {
    pub fn iter(&self) -> impl Iterator<Item = Arc<ValidationMessage>> + 'a {
        let mut seen = HashSet::new();
        self.set
            .filings
            .values()
            .filter_map(|f| f.validation_messages())
            .flatten()
            .filter(move |m| seen.insert(m.api_id.clone()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn exists(&self, api_id: &str) -> bool {
        self.iter().any(|m| m.api_id == api_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filing::{FilingFields, LinkCandidates};
    use crate::parsing::ParseSettings;
    use crate::resource::RequestInfo;
    use chrono::Utc;
    use serde_json::json;

    fn request() -> RequestInfo {
        RequestInfo {
            url: "https://filings.xbrl.org/api/filings".to_string(),
            time: Utc::now().fixed_offset(),
        }
    }

    fn entity(id: &str) -> Arc<Entity> {
        let json = json!({"attributes": {"name": format!("Entity {id}"), "identifier": "LEI"}});
        let (entity, _) = Entity::from_json(id, &json, &request(), &ParseSettings::default()).unwrap();
        Arc::new(entity)
    }

    fn filing(id: &str, entity: &Arc<Entity>) -> Arc<Filing> {
        let json = json!({
            "attributes": {"country": "FI", "period_end": "2023-12-31", "error_count": 1},
            "relationships": {"entity": {"data": {"type": "entity", "id": entity.api_id}}}
        });
        let (fields, _) =
            FilingFields::from_json(id, &json, &request(), &ParseSettings::default()).unwrap();
        let entities = HashMap::from([(entity.api_id.clone(), entity.clone())]);
        Filing::link(
            fields,
            LinkCandidates {
                entities: Some(&entities),
                messages: None,
            },
            &mut Vec::new(),
        )
    }

    fn pair() -> (FilingSet, FilingSet, Arc<Entity>) {
        let e = entity("10");
        let a = FilingSet::from_iter([filing("1", &e), filing("2", &e)]);
        let b = FilingSet::from_iter([filing("2", &e), filing("3", &e)]);
        (a, b, e)
    }

    fn shares_objects(x: &FilingSet, y: &FilingSet) -> bool {
        x.iter()
            .any(|f| y.iter().any(|g| Arc::ptr_eq(f, g)))
    }

    #[test]
    fn new_set_operations_copy() {
        let (a, b, _) = pair();
        let union = &a | &b;
        assert_eq!(union.len(), 3);
        assert!(!shares_objects(&union, &a));
        assert!(!shares_objects(&union, &b));

        let entities = union.entities().iter().collect::<Vec<_>>();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].filing_count(), 3);

        assert_eq!((&a & &b).len(), 1);
        assert!((&a & &b).get("2").is_some());
        assert_eq!((&a - &b).len(), 1);
        assert!((&a - &b).get("1").is_some());
        assert_eq!((&a ^ &b).len(), 2);
    }

    #[test]
    fn in_place_update_keeps_receiver_objects() {
        let (mut a, b, _) = pair();
        let originals = a.iter().cloned().collect::<Vec<_>>();
        a |= &b;
        assert_eq!(a.len(), 3);
        for original in &originals {
            assert!(Arc::ptr_eq(a.get(&original.api_id).unwrap(), original));
        }
        assert!(!Arc::ptr_eq(a.get("3").unwrap(), b.get("3").unwrap()));
        // the copied filing joins the receiver's entity
        let entity = a.get("1").unwrap().entity().unwrap().clone();
        assert!(Arc::ptr_eq(a.get("3").unwrap().entity().unwrap(), &entity));
    }

    #[test]
    fn in_place_removals_detach() {
        let (mut a, b, e) = pair();
        assert_eq!(e.filing_count(), 4);
        a -= &b;
        assert_eq!(a.len(), 1);
        assert_eq!(e.filing_count(), 3);

        let (mut a, b, _) = pair();
        a &= &b;
        assert_eq!(a.len(), 1);
        assert!(a.get("2").is_some());

        let (mut a, b, _) = pair();
        a ^= &b;
        let mut ids = a.iter().map(|f| f.api_id.clone()).collect::<Vec<_>>();
        ids.sort();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn add_is_first_write_wins() {
        let (mut a, _, e) = pair();
        let existing = a.get("1").unwrap().clone();
        assert!(!a.add(&filing("1", &e)));
        assert!(Arc::ptr_eq(a.get("1").unwrap(), &existing));

        let newcomer = filing("9", &e);
        assert!(a.add(&newcomer));
        assert!(!Arc::ptr_eq(a.get("9").unwrap(), &newcomer));
        assert_eq!(a.entities().len(), 1);
    }

    #[test]
    fn remove_discard_pop() {
        let (mut a, _, e) = pair();
        let f1 = a.get("1").unwrap().clone();
        a.remove(&f1).unwrap();
        assert!(matches!(a.remove(&f1), Err(XbrlError::NotFound(_))));
        assert!(a.discard(&f1).is_none());
        assert_eq!(e.filing_count(), 1);

        let popped = a.pop().unwrap();
        assert_eq!(popped.api_id, "2");
        assert!(a.is_empty());
        assert_eq!(e.filing_count(), 0);
        assert!(a.pop().is_none());
    }

    #[test]
    fn clear_detaches_filings() {
        let (mut a, _, e) = pair();
        let held = a.get("1").unwrap().clone();
        a.clear();
        assert!(a.is_empty());
        assert_eq!(e.filing_count(), 2);
        assert!(!e.filings().iter().any(|f| Arc::ptr_eq(f, &held)));
    }

    #[test]
    fn comparisons() {
        let (a, b, _) = pair();
        let small = &a & &b;
        assert!(small.is_subset(&a));
        assert!(a.is_superset(&small));
        assert!(!a.is_disjoint(&b));
        assert!((&a - &b).is_disjoint(&b));
        assert_eq!(a.copy(), a);
    }

    #[test]
    fn only_filings_are_accepted() {
        let e = entity("10");
        let result = FilingSet::try_from_resources(vec![
            AnyResource::from(filing("1", &e)),
            AnyResource::from(e.clone()),
        ]);
        assert!(matches!(result, Err(XbrlError::NotAFiling(_))));
    }

    #[test]
    fn data_columns_with_entity() {
        let (a, _, _) = pair();
        let options = ColumnOptions::new().with_entity(true);
        let columns = a.get_data_columns(None, &options);
        let names = columns.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>();
        assert_eq!(names[0], "api_id");
        assert!(names.contains(&"entity.name"));
        assert!(!names.contains(&"entity_api_id"));
        assert!(!names.iter().any(|n| n.ends_with("_url")));

        let (_, names_col) = columns.iter().find(|(n, _)| n == "entity.name").unwrap();
        assert_eq!(names_col, &vec![DataValue::Text("Entity 10".to_string()); 2]);

        let explicit = vec!["error_count".to_string(), "api_id".to_string()];
        let columns = a.get_data_columns(Some(&explicit), &ColumnOptions::default());
        assert_eq!(columns[0].0, "error_count");
        assert_eq!(columns[0].1, vec![DataValue::Integer(1); 2]);
        assert_eq!(
            columns[1].1,
            vec![DataValue::Text("1".to_string()), DataValue::Text("2".to_string())]
        );
    }
}
