//! One resolved step of an eager-load tree.
//!
//! A node loads one relation alias for every entity of its parent set in as
//! few fetches as possible: the distinct keys of all parents are gathered and
//! sent in batches of `LoaderConfig::batch_size`, and the results are matched
//! back to the parents by key.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::config::LoaderConfig;
use crate::entity::{EntityRef, Related};
use crate::error::{EagerError, EagerResult};
use crate::fetch::{Constraint, FetchQuery, Fetcher};
use crate::relations::{RelationDescriptor, RelationKey, RelationKind};
use crate::value::Value;

/// A node of the resolved tree.
#[derive(Clone)]
pub struct EagerLoad {
    name: String,
    relation: Arc<RelationDescriptor>,
    constraint: Option<Constraint>,
    parent: Option<usize>,
    depth: usize,
    loaded: Vec<EntityRef>,
}

impl EagerLoad {
    /// Create a node for the path prefix `name`.
    ///
    /// `parent` is the index of the parent node in the tree, or `None` when
    /// the node loads directly on the subject.
    pub fn new(
        name: impl Into<String>,
        relation: Arc<RelationDescriptor>,
        constraint: Option<Constraint>,
        parent: Option<usize>,
        depth: usize,
    ) -> Self {
        Self {
            name: name.into(),
            relation,
            constraint,
            parent,
            depth,
            loaded: Vec::new(),
        }
    }

    /// Full path prefix of this node, e.g. `posts.comments`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alias loaded by this node (the last segment of its name).
    pub fn alias(&self) -> &str {
        &self.relation.alias
    }

    /// Relation descriptor.
    pub fn relation(&self) -> &Arc<RelationDescriptor> {
        &self.relation
    }

    /// Constraint applied to this node's fetch.
    pub fn constraint(&self) -> Option<&Constraint> {
        self.constraint.as_ref()
    }

    pub(crate) fn set_constraint(&mut self, constraint: Option<Constraint>) {
        self.constraint = constraint;
    }

    /// Index of the parent node, `None` for top-level nodes.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Nesting level, zero for top-level nodes.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Entity type this node loads.
    pub fn referenced_entity_type(&self) -> &str {
        &self.relation.referenced_entity_type
    }

    /// Entities fetched by the last load.
    pub fn loaded(&self) -> &[EntityRef] {
        &self.loaded
    }

    /// Load the relation for every entity in `parents` and attach the results.
    pub async fn load(
        &mut self,
        parents: &[EntityRef],
        fetcher: &dyn Fetcher,
        config: &LoaderConfig,
    ) -> EagerResult<()> {
        self.loaded = match self.relation.kind {
            RelationKind::BelongsTo | RelationKind::HasOne | RelationKind::HasMany => {
                self.load_direct(parents, fetcher, config).await?
            }
            RelationKind::HasManyThrough => self.load_through(parents, fetcher, config).await?,
            kind => return Err(EagerError::unsupported_relation_kind(kind).with_path(&self.name)),
        };

        debug!(
            path = %self.name,
            parents = parents.len(),
            loaded = self.loaded.len(),
            "Eager load complete"
        );
        Ok(())
    }

    async fn load_direct(
        &self,
        parents: &[EntityRef],
        fetcher: &dyn Fetcher,
        config: &LoaderConfig,
    ) -> EagerResult<Vec<EntityRef>> {
        let local = self.single_field(&self.relation.fields)?;
        let referenced = self.single_field(&self.relation.referenced_fields)?;

        let keys = distinct_keys(parents, local);
        if keys.is_empty() {
            self.attach_empty(parents);
            return Ok(Vec::new());
        }

        let fetched = fetch_batched(
            fetcher,
            &self.relation.referenced_entity_type,
            referenced,
            keys,
            self.constraint.as_ref(),
            config.batch_size,
        )
        .await?;

        let grouped = group_by_key(&fetched, referenced);
        if !self.relation.kind.is_one() {
            for parent in parents {
                let matches = key_of(parent, local).and_then(|k| grouped.get(&k).cloned());
                parent
                    .write()
                    .set_related(self.alias(), Related::Many(matches.unwrap_or_default()));
            }
            return Ok(fetched);
        }

        // Only the first match per key is attached; extra rows stay unreachable.
        let mut attached = Vec::new();
        let mut seen = HashSet::new();
        for parent in parents {
            let target = key_of(parent, local)
                .and_then(|k| grouped.get(&k))
                .and_then(|m| m.first().cloned());
            if let Some(target) = &target {
                if seen.insert(Arc::as_ptr(target) as *const () as usize) {
                    attached.push(target.clone());
                }
            }
            parent.write().set_related(self.alias(), Related::One(target));
        }

        Ok(attached)
    }

    async fn load_through(
        &self,
        parents: &[EntityRef],
        fetcher: &dyn Fetcher,
        config: &LoaderConfig,
    ) -> EagerResult<Vec<EntityRef>> {
        let through = self.relation.through.as_ref().ok_or_else(|| {
            EagerError::internal(format!(
                "relation `{}` has no intermediate entity",
                self.relation.alias
            ))
            .with_path(&self.name)
        })?;
        let local = self.single_field(&self.relation.fields)?;
        let referenced = self.single_field(&self.relation.referenced_fields)?;
        let through_local = self.single_field(&through.fields)?;
        let through_referenced = self.single_field(&through.referenced_fields)?;

        let keys = distinct_keys(parents, local);
        if keys.is_empty() {
            self.attach_empty(parents);
            return Ok(Vec::new());
        }

        let intermediates = fetch_batched(
            fetcher,
            &through.entity_type,
            through_local,
            keys,
            None,
            config.batch_size,
        )
        .await?;

        // parent key -> target keys reachable through its intermediates
        let mut links: HashMap<String, HashSet<String>> = HashMap::new();
        let mut target_keys = Vec::new();
        let mut seen = HashSet::new();
        for intermediate in &intermediates {
            let guard = intermediate.read();
            let parent_key = guard.attribute(through_local).and_then(|v| v.key_repr());
            let target_key = guard.attribute(through_referenced).filter(|v| !v.is_null());
            drop(guard);

            let (Some(parent_key), Some(target_key)) = (parent_key, target_key) else {
                continue;
            };
            let Some(repr) = target_key.key_repr() else {
                continue;
            };
            links.entry(parent_key).or_default().insert(repr.clone());
            if seen.insert(repr) {
                target_keys.push(target_key);
            }
        }

        if target_keys.is_empty() {
            self.attach_empty(parents);
            return Ok(Vec::new());
        }

        let targets = fetch_batched(
            fetcher,
            &self.relation.referenced_entity_type,
            referenced,
            target_keys,
            self.constraint.as_ref(),
            config.batch_size,
        )
        .await?;
        let grouped = group_by_key(&targets, referenced);

        for parent in parents {
            let reachable = key_of(parent, local).and_then(|k| links.get(&k));
            let mut groups: Vec<(usize, &Vec<EntityRef>)> = reachable
                .into_iter()
                .flatten()
                .filter_map(|key| grouped.get_full(key).map(|(index, _, group)| (index, group)))
                .collect();
            // fetch order carries any constraint ordering
            groups.sort_unstable_by_key(|(index, _)| *index);
            let related = groups
                .into_iter()
                .flat_map(|(_, group)| group.iter().cloned())
                .collect();
            parent.write().set_related(self.alias(), Related::Many(related));
        }

        Ok(targets)
    }

    fn single_field<'a>(&self, key: &'a RelationKey) -> EagerResult<&'a str> {
        key.as_single().ok_or_else(|| {
            EagerError::composite_key(self.relation.referenced_entity_type.clone(), self.alias())
                .with_path(&self.name)
        })
    }

    fn attach_empty(&self, parents: &[EntityRef]) {
        for parent in parents {
            let related = if self.relation.kind.is_one() {
                Related::One(None)
            } else {
                Related::Many(Vec::new())
            };
            parent.write().set_related(self.alias(), related);
        }
    }
}

impl fmt::Debug for EagerLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerLoad")
            .field("name", &self.name)
            .field("kind", &self.relation.kind)
            .field("referenced_entity_type", &self.relation.referenced_entity_type)
            .field("constrained", &self.constraint.is_some())
            .field("parent", &self.parent)
            .field("depth", &self.depth)
            .field("loaded", &self.loaded.len())
            .finish()
    }
}

fn key_of(entity: &EntityRef, field: &str) -> Option<String> {
    entity.read().attribute(field).and_then(|v| v.key_repr())
}

/// Distinct non-null values of `field` across `entities`, in first-seen order.
fn distinct_keys(entities: &[EntityRef], field: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for entity in entities {
        let Some(value) = entity.read().attribute(field) else {
            continue;
        };
        if let Some(repr) = value.key_repr() {
            if seen.insert(repr) {
                keys.push(value);
            }
        }
    }
    keys
}

fn group_by_key(entities: &[EntityRef], field: &str) -> IndexMap<String, Vec<EntityRef>> {
    let mut grouped: IndexMap<String, Vec<EntityRef>> = IndexMap::new();
    for entity in entities {
        if let Some(key) = key_of(entity, field) {
            grouped.entry(key).or_default().push(entity.clone());
        }
    }
    grouped
}

async fn fetch_batched(
    fetcher: &dyn Fetcher,
    entity_type: &str,
    key_field: &str,
    keys: Vec<Value>,
    constraint: Option<&Constraint>,
    batch_size: usize,
) -> EagerResult<Vec<EntityRef>> {
    let mut fetched = Vec::new();
    for chunk in keys.chunks(batch_size.max(1)) {
        let mut query = FetchQuery::new(entity_type, key_field, chunk.to_vec());
        if let Some(constraint) = constraint {
            constraint(&mut query);
        }
        debug!(
            entity_type = %entity_type,
            key_field = %key_field,
            keys = chunk.len(),
            "Fetching related entities"
        );
        fetched.extend(fetcher.fetch(&query).await?);
    }
    Ok(fetched)
}
