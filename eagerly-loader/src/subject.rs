//! Root input of a load and its normalized form.

use std::fmt;

use crate::entity::EntityRef;
use crate::error::{EagerError, EagerResult};
use crate::value::Value;

/// One-shot stream of entities produced by a single-type query.
pub struct Resultset {
    rows: Box<dyn Iterator<Item = EntityRef> + Send>,
}

impl Resultset {
    /// Wrap an iterator of entities.
    pub fn new<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = EntityRef>,
        I::IntoIter: Send + 'static,
    {
        Self {
            rows: Box::new(rows.into_iter()),
        }
    }

    /// Drain the resultset into a list, in iteration order.
    pub fn drain(self) -> Vec<EntityRef> {
        self.rows.collect()
    }
}

impl fmt::Debug for Resultset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Resultset(..)")
    }
}

/// Element of a generic collection subject.
#[derive(Debug, Clone)]
pub enum Element {
    /// An entity.
    Entity(EntityRef),
    /// A plain value. Falsy values are dropped, anything else is rejected.
    Value(Value),
}

impl From<EntityRef> for Element {
    fn from(entity: EntityRef) -> Self {
        Self::Entity(entity)
    }
}

impl From<Value> for Element {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Option<EntityRef>> for Element {
    fn from(entity: Option<EntityRef>) -> Self {
        match entity {
            Some(entity) => Self::Entity(entity),
            None => Self::Value(Value::Null),
        }
    }
}

/// The root input of a load.
#[derive(Debug)]
pub enum Subject {
    /// A single entity; `get` returns it back.
    Entity(EntityRef),
    /// A streamed result of one query.
    Resultset(Resultset),
    /// A generic collection.
    Collection(Vec<Element>),
    /// Any other value. `Null` and `false` mean "nothing to load".
    Value(Value),
}

impl Subject {
    /// The empty subject.
    pub fn none() -> Self {
        Self::Value(Value::Null)
    }

    /// Create a resultset subject from an iterator of entities.
    pub fn resultset<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = EntityRef>,
        I::IntoIter: Send + 'static,
    {
        Self::Resultset(Resultset::new(rows))
    }

    /// Normalize into a homogeneous entity list.
    pub fn normalize(self) -> EagerResult<NormalizedSubject> {
        match self {
            Self::Entity(entity) => {
                let entity_type = entity.read().entity_type().to_string();
                Ok(NormalizedSubject::some(entity_type, vec![entity], true))
            }
            Self::Resultset(rows) => {
                let entities = rows.drain();
                let entity_type = match entities.first() {
                    Some(first) => first.read().entity_type().to_string(),
                    None => return Ok(NormalizedSubject::none()),
                };
                Ok(NormalizedSubject::some(entity_type, entities, false))
            }
            Self::Collection(elements) => normalize_collection(elements),
            Self::Value(Value::Null) | Self::Value(Value::Bool(false)) => {
                Ok(NormalizedSubject::none())
            }
            Self::Value(other) => Err(EagerError::invalid_subject(format!("got value `{}`", other))),
        }
    }
}

fn normalize_collection(elements: Vec<Element>) -> EagerResult<NormalizedSubject> {
    let mut entity_type: Option<String> = None;
    let mut entities = Vec::with_capacity(elements.len());

    for element in elements {
        match element {
            Element::Value(value) if value.is_falsy() => continue,
            Element::Value(value) => {
                return Err(EagerError::invalid_subject(format!(
                    "collection contains the non-entity value `{}`",
                    value
                )));
            }
            Element::Entity(entity) => {
                let current = entity.read().entity_type().to_string();
                match &entity_type {
                    None => entity_type = Some(current),
                    Some(expected) if *expected != current => {
                        return Err(EagerError::invalid_subject(format!(
                            "collection mixes `{}` and `{}` entities",
                            expected, current
                        ))
                        .with_model(expected.clone()));
                    }
                    Some(_) => {}
                }
                entities.push(entity);
            }
        }
    }

    Ok(match entity_type {
        Some(entity_type) => NormalizedSubject::some(entity_type, entities, false),
        None => NormalizedSubject::none(),
    })
}

impl From<EntityRef> for Subject {
    fn from(entity: EntityRef) -> Self {
        Self::Entity(entity)
    }
}

impl From<Vec<EntityRef>> for Subject {
    fn from(entities: Vec<EntityRef>) -> Self {
        Self::Collection(entities.into_iter().map(Element::Entity).collect())
    }
}

impl From<Vec<Element>> for Subject {
    fn from(elements: Vec<Element>) -> Self {
        Self::Collection(elements)
    }
}

impl From<Resultset> for Subject {
    fn from(rows: Resultset) -> Self {
        Self::Resultset(rows)
    }
}

impl From<Value> for Subject {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Option<EntityRef>> for Subject {
    fn from(entity: Option<EntityRef>) -> Self {
        match entity {
            Some(entity) => Self::Entity(entity),
            None => Self::none(),
        }
    }
}

/// Canonical subject: one entity type and its entities, or nothing.
#[derive(Debug, Clone, Default)]
pub struct NormalizedSubject {
    /// Entity type shared by every entity; `None` for the empty subject.
    pub entity_type: Option<String>,
    /// Entities in input order; `None` for the empty subject.
    pub entities: Option<Vec<EntityRef>>,
    /// Whether the subject was a single entity.
    pub return_single: bool,
}

impl NormalizedSubject {
    fn some(entity_type: String, entities: Vec<EntityRef>, return_single: bool) -> Self {
        Self {
            entity_type: Some(entity_type),
            entities: Some(entities),
            return_single,
        }
    }

    /// The empty subject.
    pub fn none() -> Self {
        Self::default()
    }

    /// Check if there is nothing to load.
    pub fn is_none(&self) -> bool {
        self.entities.is_none()
    }
}
