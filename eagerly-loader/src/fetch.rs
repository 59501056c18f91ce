//! The fetch boundary: what a node asks for and who answers.
//!
//! Each eager-load node describes its batched fetch as a [`FetchQuery`]:
//! "entities of type T whose key field is one of these values", optionally
//! narrowed by the path's constraint. A [`Fetcher`] executes it; it is the
//! only place eager loading performs I/O.
//!
//! [`MemoryStore`] is an in-memory fetcher that evaluates queries against
//! stored records.
//!
//! ```rust
//! use eagerly_loader::fetch::{FetchQuery, SortOrder};
//! use eagerly_loader::{Filter, Value};
//!
//! let mut query = FetchQuery::new("Comment", "post_id", vec![Value::Int(1), Value::Int(2)]);
//! query
//!     .r#where(Filter::eq("approved", true))
//!     .order_by("created_at", SortOrder::Desc)
//!     .limit(20);
//!
//! let (sql, params) = query.to_sql();
//! assert_eq!(
//!     sql,
//!     "SELECT * FROM Comment WHERE (post_id IN ($1, $2) AND approved = $3) ORDER BY created_at DESC LIMIT 20"
//! );
//! assert_eq!(params.len(), 3);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::trace;

use crate::entity::{Entity, EntityRef, entity_ref};
use crate::error::EagerResult;
use crate::filter::Filter;
use crate::value::Value;

/// A constraint narrowing a node's fetch.
pub type Constraint = Arc<dyn Fn(&mut FetchQuery) + Send + Sync>;

/// Wrap a closure into a [`Constraint`].
pub fn constraint<F>(f: F) -> Constraint
where
    F: Fn(&mut FetchQuery) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Sort order for fetched entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Ascending order (A-Z, 0-9, oldest first).
    #[default]
    Asc,
    /// Descending order (Z-A, 9-0, newest first).
    Desc,
}

impl SortOrder {
    /// Get the SQL keyword for this sort order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// One field of an ORDER BY clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByField {
    /// The field name to order by.
    pub field: String,
    /// The sort order.
    pub order: SortOrder,
}

impl OrderByField {
    /// Create a new order by field.
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    /// Generate the SQL for this field.
    pub fn to_sql(&self) -> String {
        format!("{} {}", self.field, self.order.as_sql())
    }
}

/// A batched fetch of related entities.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchQuery {
    entity_type: String,
    key_field: String,
    keys: Vec<Value>,
    filter: Filter,
    order_by: Vec<OrderByField>,
    limit: Option<u64>,
}

impl FetchQuery {
    /// Create a query for `entity_type` entities whose `key_field` is one of `keys`.
    pub fn new(entity_type: impl Into<String>, key_field: impl Into<String>, keys: Vec<Value>) -> Self {
        Self {
            entity_type: entity_type.into(),
            key_field: key_field.into(),
            keys,
            filter: Filter::None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Add a filter; successive calls are combined with AND.
    pub fn r#where(&mut self, filter: impl Into<Filter>) -> &mut Self {
        let current = std::mem::take(&mut self.filter);
        self.filter = current.and_then(filter.into());
        self
    }

    /// Append an ordering.
    pub fn order_by(&mut self, field: impl Into<String>, order: SortOrder) -> &mut Self {
        self.order_by.push(OrderByField::new(field, order));
        self
    }

    /// Limit the number of entities returned by this fetch.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Entity type being fetched.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Field matched against the keys.
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Key values to match.
    pub fn keys(&self) -> &[Value] {
        &self.keys
    }

    /// Additional filter added by constraints.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Requested ordering.
    pub fn ordering(&self) -> &[OrderByField] {
        &self.order_by
    }

    /// Requested limit.
    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    /// The complete condition: key membership AND the constraint filter.
    pub fn condition(&self) -> Filter {
        Filter::In(self.key_field.clone(), self.keys.clone()).and_then(self.filter.clone())
    }

    /// Check if an entity satisfies the query's condition.
    pub fn matches(&self, entity: &dyn Entity) -> bool {
        entity.entity_type() == self.entity_type && self.condition().matches(entity)
    }

    /// Render the query as SQL with `$n` placeholders.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let (where_sql, params) = self.condition().to_sql(0);
        let mut sql = format!("SELECT * FROM {} WHERE {}", self.entity_type, where_sql);
        if !self.order_by.is_empty() {
            let order: Vec<_> = self.order_by.iter().map(OrderByField::to_sql).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        (sql, params)
    }

    /// Order and truncate an already filtered result in place.
    pub fn apply_ordering(&self, entities: &mut Vec<EntityRef>) {
        if !self.order_by.is_empty() {
            entities.sort_by(|a, b| {
                let (a, b) = (a.read(), b.read());
                for order in &self.order_by {
                    let left = a.attribute(&order.field).unwrap_or(Value::Null);
                    let right = b.attribute(&order.field).unwrap_or(Value::Null);
                    let ord = left.compare(&right).unwrap_or(Ordering::Equal);
                    let ord = match order.order {
                        SortOrder::Asc => ord,
                        SortOrder::Desc => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }
        if let Some(limit) = self.limit {
            entities.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
    }
}

/// Executes batched fetches for eager-load nodes.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch every entity matching the query.
    async fn fetch(&self, query: &FetchQuery) -> EagerResult<Vec<EntityRef>>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn fetch(&self, query: &FetchQuery) -> EagerResult<Vec<EntityRef>> {
        (**self).fetch(query).await
    }
}

/// In-memory fetcher holding entities by type.
///
/// Fetches return the stored handles themselves, so entities loaded through
/// different paths are shared.
#[derive(Default)]
pub struct MemoryStore {
    entities: RwLock<IndexMap<String, Vec<EntityRef>>>,
    fetches: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity and return its handle.
    pub fn insert<E: Entity + 'static>(&self, entity: E) -> EntityRef {
        let entity = entity_ref(entity);
        self.insert_ref(entity.clone());
        entity
    }

    /// Insert an existing handle.
    pub fn insert_ref(&self, entity: EntityRef) {
        let entity_type = entity.read().entity_type().to_string();
        self.entities.write().entry(entity_type).or_default().push(entity);
    }

    /// All entities of a type, in insertion order.
    pub fn all(&self, entity_type: &str) -> Vec<EntityRef> {
        self.entities
            .read()
            .get(entity_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of fetches served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(AtomicOrdering::SeqCst)
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entities = self.entities.read();
        let counts: Vec<_> = entities.iter().map(|(t, e)| (t.clone(), e.len())).collect();
        f.debug_struct("MemoryStore")
            .field("entities", &counts)
            .field("fetches", &self.fetch_count())
            .finish()
    }
}

#[async_trait]
impl Fetcher for MemoryStore {
    async fn fetch(&self, query: &FetchQuery) -> EagerResult<Vec<EntityRef>> {
        self.fetches.fetch_add(1, AtomicOrdering::SeqCst);
        let mut found: Vec<EntityRef> = self
            .all(query.entity_type())
            .into_iter()
            .filter(|entity| query.matches(&*entity.read()))
            .collect();
        query.apply_ordering(&mut found);
        trace!(
            entity_type = %query.entity_type(),
            keys = query.keys().len(),
            found = found.len(),
            "Memory store fetch"
        );
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Record;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert(Record::new("Comment").with("id", 1).with("post_id", 1).with("likes", 3));
        store.insert(Record::new("Comment").with("id", 2).with("post_id", 1).with("likes", 9));
        store.insert(Record::new("Comment").with("id", 3).with("post_id", 2).with("likes", 5));
        store.insert(Record::new("Comment").with("id", 4).with("post_id", 7).with("likes", 1));
        store
    }

    fn ids(entities: &[EntityRef]) -> Vec<i64> {
        entities
            .iter()
            .filter_map(|e| e.read().attribute("id").and_then(|v| v.as_i64()))
            .collect()
    }

    #[tokio::test]
    async fn test_fetch_by_keys() {
        let store = store();
        let query = FetchQuery::new("Comment", "post_id", vec![Value::Int(1), Value::Int(2)]);
        let found = store.fetch(&query).await.unwrap();
        assert_eq!(ids(&found), vec![1, 2, 3]);
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_with_filter_order_and_limit() {
        let store = store();
        let mut query = FetchQuery::new("Comment", "post_id", vec![Value::Int(1), Value::Int(2)]);
        query
            .r#where(Filter::Gt("likes".into(), Value::Int(2)))
            .order_by("likes", SortOrder::Desc)
            .limit(2);
        let found = store.fetch(&query).await.unwrap();
        assert_eq!(ids(&found), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_fetch_returns_stored_handles() {
        let store = MemoryStore::new();
        let stored = store.insert(Record::new("User").with("id", 1));
        let found = store
            .fetch(&FetchQuery::new("User", "id", vec![Value::Int(1)]))
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&found[0], &stored));
    }

    #[test]
    fn test_where_combines_with_and() {
        let mut query = FetchQuery::new("Post", "user_id", vec![Value::Int(1)]);
        query.r#where(Filter::eq("a", 1)).r#where(Filter::eq("b", 2));
        assert_eq!(
            query.filter(),
            &Filter::And(vec![Filter::eq("a", 1), Filter::eq("b", 2)])
        );
    }

    #[test]
    fn test_constraint_mutates_query() {
        let c = constraint(|q: &mut FetchQuery| {
            q.limit(5);
        });
        let mut query = FetchQuery::new("Post", "user_id", vec![]);
        c(&mut query);
        assert_eq!(query.limit_value(), Some(5));
    }
}
