//! Relation-path tree resolution.
//!
//! Every requested path is split into alias segments and resolved level by
//! level against the relation catalog. Resolved prefixes are kept in an
//! ordered map keyed by the prefix, so a prefix shared by several paths is
//! resolved once and every path continues from the same node. A node is
//! always inserted after its parent, which makes insertion order a valid
//! execution order.
//!
//! ```rust
//! use eagerly_loader::arguments::parse_arguments;
//! use eagerly_loader::relations::{RelationDescriptor, RelationRegistry};
//! use eagerly_loader::tree::build_tree;
//!
//! let catalog = RelationRegistry::new()
//!     .with("User", RelationDescriptor::has_many("posts", "id", "Post", "user_id"))
//!     .with("Post", RelationDescriptor::has_many("comments", "id", "Comment", "post_id"));
//!
//! let spec = parse_arguments(vec!["posts.comments".into(), "posts".into()]).unwrap();
//! let tree = build_tree("User", &spec, &catalog).unwrap();
//!
//! assert_eq!(tree.paths().collect::<Vec<_>>(), vec!["posts", "posts.comments"]);
//! assert_eq!(tree.parent(1).map(|p| p.name()), Some("posts"));
//! ```

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::arguments::EagerLoadSpec;
use crate::error::{EagerError, EagerResult};
use crate::fetch::Constraint;
use crate::node::EagerLoad;
use crate::relations::RelationCatalog;

/// Resolved eager-load nodes keyed by path prefix, ancestors first.
#[derive(Debug, Clone, Default)]
pub struct ResolvedTree {
    nodes: IndexMap<String, EagerLoad>,
}

impl ResolvedTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a node by its path prefix.
    pub fn get(&self, path: &str) -> Option<&EagerLoad> {
        self.nodes.get(path)
    }

    /// Get a node by position.
    pub fn get_index(&self, index: usize) -> Option<&EagerLoad> {
        self.nodes.get_index(index).map(|(_, node)| node)
    }

    pub(crate) fn get_index_mut(&mut self, index: usize) -> Option<&mut EagerLoad> {
        self.nodes.get_index_mut(index).map(|(_, node)| node)
    }

    /// Position of a path prefix.
    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.nodes.get_index_of(path)
    }

    /// Parent node of the node at `index`.
    pub fn parent(&self, index: usize) -> Option<&EagerLoad> {
        self.get_index(index)
            .and_then(EagerLoad::parent)
            .and_then(|parent| self.get_index(parent))
    }

    /// Nodes in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &EagerLoad> {
        self.nodes.values()
    }

    /// Path prefixes in execution order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Resolve every path of `spec` on `entity_type` into a tree of nodes.
///
/// Fails before any fetch when an alias is unknown, a relation kind cannot be
/// eager loaded, or a relation is keyed by more than one field.
pub fn build_tree(
    entity_type: &str,
    spec: &EagerLoadSpec,
    catalog: &dyn RelationCatalog,
) -> EagerResult<ResolvedTree> {
    let tree = resolve_paths(entity_type, spec.sorted(), catalog)?;
    debug!(
        entity_type = %entity_type,
        paths = spec.len(),
        nodes = tree.len(),
        "Resolved eager-load tree"
    );
    Ok(tree)
}

/// Resolve paths in the given order. A path whose every prefix already has a
/// node only replaces that node's constraint.
fn resolve_paths(
    entity_type: &str,
    paths: Vec<(&str, Option<&Constraint>)>,
    catalog: &dyn RelationCatalog,
) -> EagerResult<ResolvedTree> {
    let mut tree = ResolvedTree::new();

    for (path, constraint) in paths {
        let aliases: Vec<&str> = path.split('.').collect();
        let levels = aliases.len();

        // longest prefix already resolved by an earlier path
        let mut level = 0;
        while level < levels && tree.nodes.contains_key(&prefix(&aliases, level)) {
            level += 1;
        }

        if level == levels {
            if let Some(node) = tree.nodes.get_mut(path) {
                trace!(path = %path, "Path already resolved, attaching its constraint");
                node.set_constraint(constraint.cloned());
            }
            continue;
        }

        while level < levels {
            let alias = aliases[level];
            let name = prefix(&aliases, level);
            let parent = match level {
                0 => None,
                _ => tree.index_of(&prefix(&aliases, level - 1)),
            };
            let parent_type = match parent {
                None => entity_type.to_string(),
                Some(index) => tree
                    .get_index(index)
                    .map(|node| node.referenced_entity_type().to_string())
                    .ok_or_else(|| EagerError::internal(format!("missing parent of `{}`", name)))?,
            };

            trace!(path = %name, parent_type = %parent_type, alias = %alias, "Resolving relation");

            let relation = catalog
                .lookup(&parent_type, alias)
                .ok_or_else(|| EagerError::relation_not_found(&parent_type, alias).with_path(&name))?;

            if !relation.kind.is_eager_loadable() {
                return Err(EagerError::unsupported_relation_kind(relation.kind)
                    .with_model(&parent_type)
                    .with_alias(alias)
                    .with_path(&name));
            }

            if relation.has_composite_key() {
                return Err(EagerError::composite_key(&parent_type, alias).with_path(&name));
            }

            let node_constraint = if level + 1 == levels {
                constraint.cloned()
            } else {
                None
            };

            let node = EagerLoad::new(name.clone(), relation, node_constraint, parent, level);
            tree.nodes.insert(name, node);
            level += 1;
        }
    }

    Ok(tree)
}

fn prefix(aliases: &[&str], level: usize) -> String {
    aliases[..=level].join(".")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::fetch::constraint;
    use crate::error::ErrorCode;
    use crate::relations::{
        RelationDescriptor, RelationKey, RelationRegistry, ThroughSpec,
    };
    use pretty_assertions::assert_eq;

    fn catalog() -> RelationRegistry {
        RelationRegistry::new()
            .with("User", RelationDescriptor::has_many("posts", "id", "Post", "user_id"))
            .with("User", RelationDescriptor::has_one("profile", "id", "Profile", "user_id"))
            .with("Post", RelationDescriptor::has_many("comments", "id", "Comment", "post_id"))
            .with("Post", RelationDescriptor::belongs_to("author", "user_id", "User", "id"))
            .with("Comment", RelationDescriptor::belongs_to("author", "user_id", "User", "id"))
            .with(
                "Post",
                RelationDescriptor::has_many_through(
                    "tags",
                    "id",
                    ThroughSpec::new("PostTag", "post_id", "tag_id"),
                    "Tag",
                    "id",
                ),
            )
    }

    struct CountingCatalog {
        inner: RelationRegistry,
        lookups: AtomicUsize,
    }

    impl RelationCatalog for CountingCatalog {
        fn lookup(&self, entity_type: &str, alias: &str) -> Option<Arc<RelationDescriptor>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup(entity_type, alias)
        }
    }

    fn spec(paths: &[&str]) -> EagerLoadSpec {
        let mut spec = EagerLoadSpec::new();
        for path in paths {
            spec.insert(*path, None);
        }
        spec
    }

    #[test]
    fn test_constraint_only_on_leaf() {
        let c = constraint(|q| {
            q.limit(1);
        });
        let mut spec = EagerLoadSpec::new();
        spec.insert("posts", None);
        spec.insert("posts.comments", Some(c.clone()));

        let tree = build_tree("User", &spec, &catalog()).unwrap();

        assert_eq!(tree.len(), 2);
        let posts = tree.get("posts").unwrap();
        let comments = tree.get("posts.comments").unwrap();
        assert!(posts.constraint().is_none());
        assert!(Arc::ptr_eq(comments.constraint().unwrap(), &c));
        assert_eq!(comments.parent(), tree.index_of("posts"));
        assert_eq!(comments.depth(), 1);
    }

    #[test]
    fn test_constraint_not_leaked_to_implicit_ancestor() {
        let mut spec = EagerLoadSpec::new();
        spec.insert("posts.comments", Some(constraint(|q| {
            q.limit(1);
        })));

        let tree = build_tree("User", &spec, &catalog()).unwrap();
        assert_eq!(tree.paths().collect::<Vec<_>>(), vec!["posts", "posts.comments"]);
        assert!(tree.get("posts").unwrap().constraint().is_none());
        assert!(tree.get("posts.comments").unwrap().constraint().is_some());
    }

    #[test]
    fn test_shared_prefix_resolved_once() {
        let catalog = CountingCatalog {
            inner: catalog(),
            lookups: AtomicUsize::new(0),
        };
        let tree = build_tree(
            "User",
            &spec(&["posts.comments.author", "posts.author", "posts.tags", "profile"]),
            &catalog,
        )
        .unwrap();

        assert_eq!(
            tree.paths().collect::<Vec<_>>(),
            vec!["posts", "posts.author", "posts.comments", "posts.comments.author", "posts.tags", "profile"]
        );
        assert_eq!(catalog.lookups.load(Ordering::SeqCst), 6);
        assert_eq!(tree.get("posts.comments.author").unwrap().referenced_entity_type(), "User");
    }

    #[test]
    fn test_ancestors_precede_descendants() {
        let tree = build_tree(
            "User",
            &spec(&["posts.comments.author", "posts.comments", "posts"]),
            &catalog(),
        )
        .unwrap();
        for (index, node) in tree.iter().enumerate() {
            if let Some(parent) = node.parent() {
                assert!(parent < index);
            }
        }
    }

    #[test]
    fn test_constraint_on_requested_ancestor() {
        let c = constraint(|q| {
            q.limit(2);
        });
        let mut spec = EagerLoadSpec::new();
        spec.insert("posts.comments.author", None);
        spec.insert("posts", Some(c.clone()));

        let tree = build_tree("User", &spec, &catalog()).unwrap();
        assert!(Arc::ptr_eq(tree.get("posts").unwrap().constraint().unwrap(), &c));
        assert!(tree.get("posts.comments").unwrap().constraint().is_none());
    }

    #[test]
    fn test_resolved_path_takes_later_constraint() {
        let c = constraint(|q| {
            q.limit(2);
        });
        let catalog = CountingCatalog {
            inner: catalog(),
            lookups: AtomicUsize::new(0),
        };

        // descendant first, so `posts` already has a node when it comes up
        let tree = resolve_paths(
            "User",
            vec![("posts.comments", None), ("posts", Some(&c))],
            &catalog,
        )
        .unwrap();

        assert_eq!(tree.len(), 2);
        assert_eq!(catalog.lookups.load(Ordering::SeqCst), 2);
        assert!(Arc::ptr_eq(tree.get("posts").unwrap().constraint().unwrap(), &c));
        assert_eq!(tree.get("posts").unwrap().depth(), 0);
        assert!(tree.get("posts.comments").unwrap().constraint().is_none());
    }

    #[test]
    fn test_relation_not_found() {
        let err = build_tree("User", &spec(&["posts.likes"]), &catalog()).unwrap_err();
        assert_eq!(err.code, ErrorCode::RelationNotFound);
        assert!(err.message.contains("`Post`"));
        assert!(err.message.contains("`likes`"));
        assert_eq!(err.context.model.as_deref(), Some("Post"));
        assert_eq!(err.context.alias.as_deref(), Some("likes"));
    }

    #[test]
    fn test_unsupported_kind() {
        let catalog = RelationRegistry::new().with(
            "User",
            RelationDescriptor::has_one_through(
                "country",
                "id",
                ThroughSpec::new("Address", "user_id", "country_id"),
                "Country",
                "id",
            ),
        );
        let err = build_tree("User", &spec(&["country"]), &catalog).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedRelationKind);
        assert!(err.message.contains("has_one_through"));
    }

    #[test]
    fn test_composite_keys_rejected() {
        let catalog = RelationRegistry::new().with(
            "User",
            RelationDescriptor::has_many(
                "posts",
                RelationKey::composite(["tenant_id", "id"]),
                "Post",
                RelationKey::composite(["tenant_id", "user_id"]),
            ),
        );
        let err = build_tree("User", &spec(&["posts"]), &catalog).unwrap_err();
        assert_eq!(err.code, ErrorCode::CompositeKeyUnsupported);
    }

    #[test]
    fn test_empty_segment_is_not_found() {
        let err = build_tree("User", &spec(&["posts..comments"]), &catalog()).unwrap_err();
        assert_eq!(err.code, ErrorCode::RelationNotFound);
    }
}
