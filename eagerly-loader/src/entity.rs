//! Entities and the relation slots eager loading fills in.
//!
//! The loader works against the [`Entity`] trait: anything that can report its
//! entity type, expose attributes by field name and store related entities by
//! alias can be eager loaded. Entities are shared through [`EntityRef`] so a
//! load mutates the caller's own instances rather than copies.
//!
//! [`Record`] is a dynamic implementation keyed by field name, used by the
//! in-memory store and convenient for tests.
//!
//! ```rust
//! use eagerly_loader::entity::{Entity, Record, entity_ref};
//!
//! let user = entity_ref(Record::new("User").with("id", 1).with("name", "ada"));
//! assert_eq!(user.read().entity_type(), "User");
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::error::{EagerError, EagerResult};
use crate::value::Value;

/// A mapped domain object that can take part in eager loading.
pub trait Entity: Send + Sync + fmt::Debug {
    /// Name of the entity type, as known to the relation catalog.
    fn entity_type(&self) -> &str;

    /// Read an attribute by field name.
    ///
    /// Returns `None` when the entity has no such field.
    fn attribute(&self, field: &str) -> Option<Value>;

    /// Store the related entities loaded for `alias`, replacing any previous
    /// value.
    fn set_related(&mut self, alias: &str, related: Related);

    /// Get the related entities stored under `alias`, if loaded.
    fn related(&self, alias: &str) -> Option<&Related>;
}

/// Shared, mutable handle to an entity.
pub type EntityRef = Arc<RwLock<dyn Entity>>;

/// Wrap an entity into a shared handle.
pub fn entity_ref<E: Entity + 'static>(entity: E) -> EntityRef {
    Arc::new(RwLock::new(entity))
}

/// Entities loaded for one relation alias.
#[derive(Clone)]
pub enum Related {
    /// A to-one relation (belongs to, has one).
    One(Option<EntityRef>),
    /// A to-many relation (has many, has many through).
    Many(Vec<EntityRef>),
}

impl Related {
    /// Get the single related entity of a to-one relation.
    pub fn as_one(&self) -> Option<&EntityRef> {
        match self {
            Self::One(entity) => entity.as_ref(),
            Self::Many(_) => None,
        }
    }

    /// Get the related entities of a to-many relation.
    pub fn as_many(&self) -> Option<&[EntityRef]> {
        match self {
            Self::One(_) => None,
            Self::Many(entities) => Some(entities),
        }
    }

    /// Iterate over every related entity regardless of cardinality.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRef> {
        let (one, many): (Option<&EntityRef>, &[EntityRef]) = match self {
            Self::One(entity) => (entity.as_ref(), &[]),
            Self::Many(entities) => (None, entities),
        };
        one.into_iter().chain(many.iter())
    }

    /// Number of related entities.
    pub fn len(&self) -> usize {
        match self {
            Self::One(entity) => usize::from(entity.is_some()),
            Self::Many(entities) => entities.len(),
        }
    }

    /// Check if nothing was found for the relation.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Related entities may point back at their parent, so only identities are printed.
impl fmt::Debug for Related {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(None) => write!(f, "One(None)"),
            Self::One(Some(entity)) => write!(f, "One({:p})", Arc::as_ptr(entity)),
            Self::Many(entities) => write!(f, "Many(len = {})", entities.len()),
        }
    }
}

/// A dynamic entity with named attributes.
#[derive(Clone, Default)]
pub struct Record {
    entity_type: String,
    attributes: IndexMap<String, Value>,
    related: IndexMap<String, Related>,
}

impl Record {
    /// Create an empty record of the given entity type.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            attributes: IndexMap::new(),
            related: IndexMap::new(),
        }
    }

    /// Set an attribute.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    /// Build a record from a JSON object.
    pub fn from_json(entity_type: impl Into<String>, json: serde_json::Value) -> EagerResult<Self> {
        let entity_type = entity_type.into();
        let serde_json::Value::Object(fields) = json else {
            return Err(EagerError::invalid_subject(format!(
                "a `{}` record must be built from a JSON object",
                entity_type
            )));
        };
        let mut record = Self::new(entity_type);
        for (field, value) in fields {
            record.attributes.insert(field, Value::from(value));
        }
        Ok(record)
    }

    /// Set an attribute in place.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(field.into(), value.into());
    }

    /// Get an attribute by reference.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// All attributes in insertion order.
    pub fn attributes(&self) -> &IndexMap<String, Value> {
        &self.attributes
    }

    /// Aliases of every loaded relation, in load order.
    pub fn related_aliases(&self) -> impl Iterator<Item = &str> {
        self.related.keys().map(String::as_str)
    }
}

impl Entity for Record {
    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn attribute(&self, field: &str) -> Option<Value> {
        self.attributes.get(field).cloned()
    }

    fn set_related(&mut self, alias: &str, related: Related) {
        self.related.insert(alias.to_string(), related);
    }

    fn related(&self, alias: &str) -> Option<&Related> {
        self.related.get(alias)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("entity_type", &self.entity_type)
            .field("attributes", &self.attributes)
            .field("related", &self.related)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_attributes() {
        let record = Record::new("User").with("id", 1).with("email", "a@b.c");
        assert_eq!(record.entity_type(), "User");
        assert_eq!(record.attribute("id"), Some(Value::Int(1)));
        assert_eq!(record.attribute("missing"), None);
    }

    #[test]
    fn test_record_from_json() {
        let record = Record::from_json("User", serde_json::json!({"id": 3, "name": "grace"}))
            .expect("object");
        assert_eq!(record.attribute("id"), Some(Value::Int(3)));
        assert!(Record::from_json("User", serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_related_slots() {
        let author = entity_ref(Record::new("User").with("id", 1));
        let mut post = Record::new("Post").with("id", 10);
        post.set_related("author", Related::One(Some(author.clone())));
        post.set_related("comments", Related::Many(vec![]));

        let slot = post.related("author").expect("author slot");
        assert!(Arc::ptr_eq(slot.as_one().expect("one"), &author));
        assert_eq!(slot.len(), 1);
        assert!(post.related("comments").expect("comments slot").is_empty());
        assert_eq!(post.related_aliases().collect::<Vec<_>>(), vec!["author", "comments"]);
    }

    #[test]
    fn test_debug_does_not_recurse_into_cycles() {
        let user = entity_ref(Record::new("User").with("id", 1));
        let post = entity_ref(Record::new("Post").with("id", 2));
        post.write().set_related("author", Related::One(Some(user.clone())));
        user.write().set_related("posts", Related::Many(vec![post.clone()]));
        let rendered = format!("{:?}", user.read());
        assert!(rendered.contains("Many(len = 1)"));
    }
}
