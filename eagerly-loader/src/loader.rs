//! The eager-load orchestrator.
//!
//! A [`Loader`] normalizes its subject and arguments once, then on every
//! execution rebuilds the relation tree and runs each node in order, so a
//! nested node always sees the entities its parent just loaded.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use eagerly_loader::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Arc::new(MemoryStore::new());
//! let user = store.insert(Record::new("User").with("id", 1));
//! store.insert(Record::new("Post").with("id", 10).with("user_id", 1));
//!
//! let catalog = RelationRegistry::new()
//!     .with("User", RelationDescriptor::has_many("posts", "id", "Post", "user_id"));
//! let ctx = EagerContext::new(catalog, store.clone());
//!
//! let loaded = Loader::load_entity(&ctx, user.clone(), vec!["posts".into()]).await.unwrap();
//! assert!(Arc::ptr_eq(&loaded, &user));
//! assert_eq!(user.read().related("posts").map(|r| r.len()), Some(1));
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{Instrument, debug, debug_span};

use crate::arguments::{EagerArg, EagerLoadSpec, parse_arguments};
use crate::config::LoaderConfig;
use crate::entity::EntityRef;
use crate::error::{EagerError, EagerResult};
use crate::fetch::{Constraint, Fetcher};
use crate::relations::RelationCatalog;
use crate::subject::{NormalizedSubject, Resultset, Subject};
use crate::tree::{ResolvedTree, build_tree};

/// Collaborators shared by every load: relation metadata, data source and
/// configuration.
#[derive(Clone)]
pub struct EagerContext {
    catalog: Arc<dyn RelationCatalog>,
    fetcher: Arc<dyn Fetcher>,
    config: LoaderConfig,
}

impl EagerContext {
    /// Create a context with the default configuration.
    pub fn new(
        catalog: impl RelationCatalog + 'static,
        fetcher: impl Fetcher + 'static,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            fetcher: Arc::new(fetcher),
            config: LoaderConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Relation catalog.
    pub fn catalog(&self) -> &dyn RelationCatalog {
        self.catalog.as_ref()
    }

    /// Data source.
    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    /// Loader configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }
}

impl fmt::Debug for EagerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// What a loader hands back.
#[derive(Debug, Clone)]
pub enum Loaded {
    /// Nothing was loaded.
    None,
    /// The single entity the loader was created with.
    One(EntityRef),
    /// The entity list.
    Many(Vec<EntityRef>),
}

impl Loaded {
    /// Check if nothing was loaded.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Get the single entity.
    pub fn as_one(&self) -> Option<&EntityRef> {
        match self {
            Self::One(entity) => Some(entity),
            _ => None,
        }
    }

    /// Get the entity list.
    pub fn as_many(&self) -> Option<&[EntityRef]> {
        match self {
            Self::Many(entities) => Some(entities),
            _ => None,
        }
    }

    /// Flatten into a list (empty for `None`).
    pub fn into_vec(self) -> Vec<EntityRef> {
        match self {
            Self::None => Vec::new(),
            Self::One(entity) => vec![entity],
            Self::Many(entities) => entities,
        }
    }
}

/// Eager loads relation paths onto a subject.
pub struct Loader {
    context: EagerContext,
    subject: NormalizedSubject,
    eager_loads: EagerLoadSpec,
}

impl Loader {
    /// Create a loader.
    ///
    /// The subject is normalized immediately. Arguments are parsed only when
    /// there is something to load and at least one argument was given.
    pub fn new(
        context: &EagerContext,
        subject: impl Into<Subject>,
        args: Vec<EagerArg>,
    ) -> EagerResult<Self> {
        let subject = subject.into().normalize()?;
        let eager_loads = if subject.is_none() || args.is_empty() {
            EagerLoadSpec::new()
        } else {
            parse_arguments(args)?
        };

        Ok(Self {
            context: context.clone(),
            subject,
            eager_loads,
        })
    }

    /// Create a loader, execute it and return the loaded subject.
    ///
    /// Only an entity, a collection or a resultset is accepted here; a bare
    /// value, including a none subject, fails with `InvalidSubject`. Use
    /// [`Loader::new`] to accept a none subject.
    pub async fn load_subject(
        context: &EagerContext,
        subject: impl Into<Subject>,
        args: Vec<EagerArg>,
    ) -> EagerResult<Loaded> {
        let subject = subject.into();
        if let Subject::Value(value) = &subject {
            return Err(EagerError::invalid_subject(format!(
                "expected an entity, a collection or a resultset, got `{}`",
                value
            )));
        }
        let mut loader = Self::new(context, subject, args)?;
        loader.execute().await?;
        Ok(loader.get())
    }

    /// Eager load relations onto one entity and return it.
    pub async fn load_entity(
        context: &EagerContext,
        entity: EntityRef,
        args: Vec<EagerArg>,
    ) -> EagerResult<EntityRef> {
        match Self::load_subject(context, entity, args).await? {
            Loaded::One(entity) => Ok(entity),
            other => Err(EagerError::internal(format!(
                "single entity subject produced {:?}",
                other
            ))),
        }
    }

    /// Eager load relations onto a collection of entities of one type.
    pub async fn load_collection(
        context: &EagerContext,
        entities: Vec<EntityRef>,
        args: Vec<EagerArg>,
    ) -> EagerResult<Vec<EntityRef>> {
        Ok(Self::load_subject(context, entities, args).await?.into_vec())
    }

    /// Drain a resultset and eager load relations onto its entities.
    pub async fn load_resultset(
        context: &EagerContext,
        rows: Resultset,
        args: Vec<EagerArg>,
    ) -> EagerResult<Vec<EntityRef>> {
        Ok(Self::load_subject(context, rows, args).await?.into_vec())
    }

    /// Register a relation path, replacing any constraint registered for the
    /// same path.
    pub fn add_eager_load(
        &mut self,
        path: impl Into<String>,
        constraint: Option<Constraint>,
    ) -> EagerResult<&mut Self> {
        let path = path.into();
        if path.is_empty() {
            return Err(EagerError::invalid_relation_alias(path, "the path is empty"));
        }
        if path.split('.').any(str::is_empty) {
            return Err(EagerError::invalid_relation_alias(path, "the path has an empty segment"));
        }
        self.eager_loads.insert(path, constraint);
        Ok(self)
    }

    /// Resolve the tree the next execution runs.
    ///
    /// An empty subject yields an empty tree without consulting the catalog.
    pub fn build_tree(&self) -> EagerResult<ResolvedTree> {
        match &self.subject.entity_type {
            Some(entity_type) if !self.eager_loads.is_empty() => {
                build_tree(entity_type, &self.eager_loads, self.context.catalog())
            }
            _ => Ok(ResolvedTree::new()),
        }
    }

    /// Resolve the tree and load every node, ancestors first.
    pub async fn execute(&mut self) -> EagerResult<&mut Self> {
        let tree = self.build_tree()?;
        let Some(entities) = self.subject.entities.clone() else {
            return Ok(self);
        };

        let span = debug_span!(
            "execute",
            entity_type = self.subject_type().unwrap_or_default(),
            nodes = tree.len()
        );
        self.run(tree, &entities).instrument(span).await?;
        Ok(self)
    }

    async fn run(&self, mut tree: ResolvedTree, entities: &[EntityRef]) -> EagerResult<()> {
        debug!(entities = entities.len(), "Executing eager loads");

        for index in 0..tree.len() {
            let parents = match tree.get_index(index).and_then(|node| node.parent()) {
                None => entities.to_vec(),
                Some(parent) => tree
                    .get_index(parent)
                    .map(|node| node.loaded().to_vec())
                    .unwrap_or_default(),
            };
            let node = tree
                .get_index_mut(index)
                .ok_or_else(|| EagerError::internal(format!("missing node {}", index)))?;
            let span = debug_span!("eager_load", path = %node.name());
            node.load(&parents, self.context.fetcher(), self.context.config())
                .instrument(span)
                .await?;
        }

        Ok(())
    }

    /// Same as [`Loader::execute`].
    pub async fn load(&mut self) -> EagerResult<&mut Self> {
        self.execute().await
    }

    /// The subject in the shape it was given: one entity, a list, or nothing.
    pub fn get(&self) -> Loaded {
        match &self.subject.entities {
            None => Loaded::None,
            Some(entities) if self.subject.return_single => match entities.first() {
                Some(entity) => Loaded::One(entity.clone()),
                None => Loaded::None,
            },
            Some(entities) => Loaded::Many(entities.clone()),
        }
    }

    /// The normalized entity list, `None` for an empty subject.
    pub fn subject(&self) -> Option<&[EntityRef]> {
        self.subject.entities.as_deref()
    }

    /// Entity type of the subject.
    pub fn subject_type(&self) -> Option<&str> {
        self.subject.entity_type.as_deref()
    }

    /// Registered relation paths.
    pub fn eager_loads(&self) -> &EagerLoadSpec {
        &self.eager_loads
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("subject_type", &self.subject.entity_type)
            .field("subject_len", &self.subject.entities.as_ref().map(Vec::len))
            .field("return_single", &self.subject.return_single)
            .field("eager_loads", &self.eager_loads)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::entity::{Record, entity_ref};
    use crate::error::ErrorCode;
    use crate::fetch::{FetchQuery, MemoryStore, constraint};
    use crate::filter::Filter;
    use crate::relations::{RelationDescriptor, RelationRegistry};
    use crate::subject::Element;
    use crate::value::Value;

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

    struct FailingFetcher;

    #[async_trait]
    impl Fetcher for FailingFetcher {
        async fn fetch(&self, query: &FetchQuery) -> EagerResult<Vec<EntityRef>> {
            Err(EagerError::fetch_failed(query.entity_type(), "connection reset"))
        }
    }

    fn registry() -> RelationRegistry {
        RelationRegistry::new()
            .with("User", RelationDescriptor::has_many("posts", "id", "Post", "user_id"))
            .with("Post", RelationDescriptor::has_many("comments", "id", "Comment", "post_id"))
            .with("Post", RelationDescriptor::belongs_to("author", "user_id", "User", "id"))
    }

    fn blog() -> (Arc<MemoryStore>, Vec<EntityRef>) {
        let store = Arc::new(MemoryStore::new());
        let users = vec![
            store.insert(Record::new("User").with("id", 1)),
            store.insert(Record::new("User").with("id", 2)),
        ];
        store.insert(Record::new("Post").with("id", 10).with("user_id", 1));
        store.insert(Record::new("Post").with("id", 11).with("user_id", 1));
        store.insert(Record::new("Post").with("id", 12).with("user_id", 2));
        for (id, post_id, approved) in [(100, 10, true), (101, 10, false), (102, 12, true)] {
            store.insert(
                Record::new("Comment")
                    .with("id", id)
                    .with("post_id", post_id)
                    .with("approved", approved),
            );
        }
        (store, users)
    }

    fn related(entity: &EntityRef, alias: &str) -> Vec<EntityRef> {
        entity
            .read()
            .related(alias)
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn ids(entities: &[EntityRef]) -> Vec<i64> {
        entities
            .iter()
            .filter_map(|e| e.read().attribute("id").and_then(|v| v.as_i64()))
            .collect()
    }

    #[tokio::test]
    async fn test_none_subject_skips_catalog() {
        let catalog = Arc::new(CountingCatalog {
            inner: registry(),
            lookups: AtomicUsize::new(0),
        });
        let ctx = EagerContext::new(catalog.clone(), MemoryStore::new());

        let mut loader = Loader::new(&ctx, Subject::none(), vec!["posts".into()]).unwrap();
        loader.add_eager_load("posts.comments", None).unwrap();
        loader.execute().await.unwrap();

        assert!(loader.get().is_none());
        assert!(loader.subject().is_none());
        assert!(loader.build_tree().unwrap().is_empty());
        assert_eq!(catalog.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falsy_collection_is_none() {
        let ctx = EagerContext::new(registry(), MemoryStore::new());
        let subject = vec![Element::Value(Value::Null), Element::Value(Value::Bool(false))];
        let loader = Loader::new(&ctx, subject, vec!["posts".into()]).unwrap();
        assert!(loader.get().is_none());
        assert_eq!(loader.subject_type(), None);
    }

    #[test]
    fn test_mixed_collection_rejected() {
        let ctx = EagerContext::new(registry(), MemoryStore::new());
        let subject = vec![
            entity_ref(Record::new("User").with("id", 1)),
            entity_ref(Record::new("Post").with("id", 1)),
        ];
        let err = Loader::new(&ctx, subject, vec!["posts".into()]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSubject);
    }

    #[test]
    fn test_arguments_validated_for_non_empty_subject() {
        let ctx = EagerContext::new(registry(), MemoryStore::new());
        let user = entity_ref(Record::new("User").with("id", 1));

        let err = Loader::new(&ctx, user.clone(), vec![EagerArg::Value(Value::Int(1))]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);

        let loader = Loader::new(&ctx, user, vec![]).unwrap();
        assert!(loader.eager_loads().is_empty());
    }

    #[tokio::test]
    async fn test_single_entity_returns_same_instance() {
        let (store, users) = blog();
        let ctx = EagerContext::new(registry(), store);

        let mut loader = Loader::new(&ctx, users[0].clone(), vec!["posts.comments".into()]).unwrap();
        loader.execute().await.unwrap();

        let loaded = loader.get();
        let user = loaded.as_one().expect("single entity");
        assert!(Arc::ptr_eq(user, &users[0]));
        let posts = related(user, "posts");
        assert_eq!(ids(&posts), vec![10, 11]);
        assert_eq!(ids(&related(&posts[0], "comments")), vec![100, 101]);
        assert_eq!(ids(&related(&posts[1], "comments")), Vec::<i64>::new());
    }

    #[tokio::test]
    async fn test_one_fetch_per_prefix() {
        let (store, users) = blog();
        let ctx = EagerContext::new(registry(), store.clone());

        let loaded = Loader::load_collection(
            &ctx,
            users.clone(),
            vec!["posts".into(), "posts.comments".into(), "posts.author".into()],
        )
        .await
        .unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(store.fetch_count(), 3);
        let post = related(&users[1], "posts").remove(0);
        let author = post.read().related("author").and_then(|r| r.as_one()).cloned();
        assert!(author.is_some_and(|a| Arc::ptr_eq(&a, &users[1])));
    }

    #[tokio::test]
    async fn test_constraint_applies_to_its_own_node() {
        let (store, users) = blog();
        let ctx = EagerContext::new(registry(), store);

        let mut loader = Loader::new(&ctx, users.clone(), vec![]).unwrap();
        loader
            .add_eager_load("posts", None)
            .unwrap()
            .add_eager_load(
                "posts.comments",
                Some(constraint(|q| {
                    q.r#where(Filter::eq("approved", true));
                })),
            )
            .unwrap();
        loader.load().await.unwrap();

        assert_eq!(ids(&related(&users[0], "posts")), vec![10, 11]);
        let post = related(&users[0], "posts").remove(0);
        assert_eq!(ids(&related(&post, "comments")), vec![100]);
    }

    #[tokio::test]
    async fn test_add_eager_load_last_write_wins() {
        let (store, users) = blog();
        let ctx = EagerContext::new(registry(), store);
        let first = constraint(|q| {
            q.limit(0);
        });
        let second = constraint(|q| {
            q.r#where(Filter::eq("id", 11));
        });

        let mut loader = Loader::new(&ctx, users[0].clone(), vec![]).unwrap();
        loader
            .add_eager_load("posts", Some(first))
            .unwrap()
            .add_eager_load("posts", Some(second.clone()))
            .unwrap();

        assert_eq!(loader.eager_loads().len(), 1);
        let kept = loader.eager_loads().get("posts").flatten().expect("constraint");
        assert!(Arc::ptr_eq(kept, &second));

        loader.execute().await.unwrap();
        assert_eq!(ids(&related(&users[0], "posts")), vec![11]);
    }

    #[test]
    fn test_add_eager_load_rejects_empty_paths() {
        let ctx = EagerContext::new(registry(), MemoryStore::new());
        let mut loader = Loader::new(&ctx, Subject::none(), vec![]).unwrap();
        for path in ["", "posts.", ".posts", "posts..comments"] {
            let err = loader.add_eager_load(path, None).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidRelationAlias);
        }
    }

    #[tokio::test]
    async fn test_relation_not_found_before_any_fetch() {
        let (store, users) = blog();
        let ctx = EagerContext::new(registry(), store.clone());

        let mut loader =
            Loader::new(&ctx, users.clone(), vec!["posts".into(), "posts.likes".into()]).unwrap();
        let err = loader.execute().await.unwrap_err();

        assert!(err.is_relation_not_found());
        assert!(err.to_string().contains("model `Post` using alias `likes`"));
        assert_eq!(store.fetch_count(), 0);
        assert!(users[0].read().related("posts").is_none());
    }

    #[tokio::test]
    async fn test_fetch_errors_surface_unchanged() {
        let ctx = EagerContext::new(registry(), FailingFetcher);
        let user = entity_ref(Record::new("User").with("id", 1));
        let err = Loader::load_entity(&ctx, user, vec!["posts".into()])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::FetchFailed);
        assert!(err.message.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_resultset_entry_point() {
        let (store, users) = blog();
        let ctx = EagerContext::new(registry(), store);
        let loaded = Loader::load_resultset(&ctx, Resultset::new(users.clone()), vec!["posts".into()])
            .await
            .unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(ids(&related(&users[1], "posts")), vec![12]);

        let empty = Loader::load_resultset(&ctx, Resultset::new(Vec::new()), vec!["posts".into()])
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_execute_reruns_fetches() {
        let (store, users) = blog();
        let ctx = EagerContext::new(registry(), store.clone());
        let mut loader = Loader::new(&ctx, users, vec!["posts".into()]).unwrap();
        loader.execute().await.unwrap();
        loader.execute().await.unwrap();
        assert_eq!(store.fetch_count(), 2);
    }
}
