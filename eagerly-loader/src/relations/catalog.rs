//! Relation catalog: maps (entity type, alias) to a relation descriptor.

use std::collections::HashMap;
use std::sync::Arc;

use super::spec::RelationDescriptor;

/// Lookup service for relation metadata.
///
/// Implementations must be idempotent and free of side effects visible to the
/// loader.
pub trait RelationCatalog: Send + Sync {
    /// Find the relation of `entity_type` registered under `alias`.
    fn lookup(&self, entity_type: &str, alias: &str) -> Option<Arc<RelationDescriptor>>;
}

impl<C: RelationCatalog + ?Sized> RelationCatalog for Arc<C> {
    fn lookup(&self, entity_type: &str, alias: &str) -> Option<Arc<RelationDescriptor>> {
        (**self).lookup(entity_type, alias)
    }
}

/// In-memory registry of relation descriptors.
#[derive(Debug, Clone, Default)]
pub struct RelationRegistry {
    relations: HashMap<String, HashMap<String, Arc<RelationDescriptor>>>,
}

impl RelationRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relation on an entity type, replacing one with the same alias.
    pub fn register(&mut self, entity_type: impl Into<String>, spec: RelationDescriptor) {
        self.relations
            .entry(entity_type.into())
            .or_default()
            .insert(spec.alias.clone(), Arc::new(spec));
    }

    /// Register a relation, builder style.
    pub fn with(mut self, entity_type: impl Into<String>, spec: RelationDescriptor) -> Self {
        self.register(entity_type, spec);
        self
    }

    /// Get a relation by entity type and alias.
    pub fn get(&self, entity_type: &str, alias: &str) -> Option<&RelationDescriptor> {
        self.relations
            .get(entity_type)
            .and_then(|by_alias| by_alias.get(alias))
            .map(Arc::as_ref)
    }

    /// Get all relations of an entity type.
    pub fn relations_of(&self, entity_type: &str) -> impl Iterator<Item = &RelationDescriptor> {
        self.relations
            .get(entity_type)
            .into_iter()
            .flat_map(|by_alias| by_alias.values().map(Arc::as_ref))
    }

    /// Number of registered relations.
    pub fn len(&self) -> usize {
        self.relations.values().map(HashMap::len).sum()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RelationCatalog for RelationRegistry {
    fn lookup(&self, entity_type: &str, alias: &str) -> Option<Arc<RelationDescriptor>> {
        self.relations
            .get(entity_type)
            .and_then(|by_alias| by_alias.get(alias))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_registry() {
        let registry = RelationRegistry::new()
            .with("User", RelationDescriptor::has_many("posts", "id", "Post", "user_id"))
            .with("Post", RelationDescriptor::belongs_to("author", "user_id", "User", "id"));

        assert!(registry.get("User", "posts").is_some());
        assert!(registry.get("Post", "author").is_some());
        assert!(registry.get("Post", "posts").is_none());
        assert!(registry.lookup("Comment", "post").is_none());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.relations_of("User").count(), 1);
    }

    #[test]
    fn test_lookup_is_idempotent() {
        let registry = RelationRegistry::new()
            .with("User", RelationDescriptor::has_many("posts", "id", "Post", "user_id"));
        let first = registry.lookup("User", "posts").expect("registered");
        let second = registry.lookup("User", "posts").expect("registered");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_register_replaces_alias() {
        let mut registry = RelationRegistry::new();
        registry.register("User", RelationDescriptor::has_many("posts", "id", "Post", "user_id"));
        registry.register("User", RelationDescriptor::has_many("posts", "id", "Post", "author_id"));
        assert_eq!(registry.len(), 1);
        let spec = registry.get("User", "posts").expect("registered");
        assert_eq!(spec.referenced_fields.as_single(), Some("author_id"));
    }
}
