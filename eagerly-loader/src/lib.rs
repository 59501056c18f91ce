//! # eagerly-loader
//!
//! Batched, dependency-ordered eager loading of related records.
//!
//! Given a root entity, a collection of entities of one type, or nothing, and
//! a set of dotted relation paths, this crate:
//! - normalizes the subject into one entity type and an entity list
//! - parses the relation paths and their optional constraints
//! - resolves the paths into a tree of relation nodes, resolving every shared
//!   prefix once and validating relation shape before any I/O
//! - runs one batched fetch per node and attaches the results onto the
//!   caller's entities
//!
//! ## Relation paths
//!
//! ```rust
//! use eagerly_loader::{ArgMap, EagerArg, parse_arguments};
//!
//! // Flat list of paths
//! let spec = parse_arguments(vec!["posts".into(), "posts.comments".into()]).unwrap();
//! assert_eq!(spec.len(), 2);
//!
//! // A single map of path => constraint
//! let spec = parse_arguments(vec![EagerArg::from(
//!     ArgMap::new().path("author").constrained("comments", |q| {
//!         q.limit(5);
//!     }),
//! )])
//! .unwrap();
//! assert!(spec.get("comments").unwrap().is_some());
//! ```
//!
//! ## Loading
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use eagerly_loader::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> EagerResult<()> {
//! let store = Arc::new(MemoryStore::new());
//! let users = vec![
//!     store.insert(Record::new("User").with("id", 1)),
//!     store.insert(Record::new("User").with("id", 2)),
//! ];
//! store.insert(Record::new("Post").with("id", 10).with("user_id", 2));
//!
//! let catalog = RelationRegistry::new()
//!     .with("User", RelationDescriptor::has_many("posts", "id", "Post", "user_id"));
//! let ctx = EagerContext::new(catalog, store.clone());
//!
//! let mut loader = Loader::new(&ctx, users.clone(), vec!["posts".into()])?;
//! loader.execute().await?;
//!
//! assert_eq!(store.fetch_count(), 1);
//! assert_eq!(users[1].read().related("posts").map(|r| r.len()), Some(1));
//! # Ok(())
//! # }
//! ```

pub mod arguments;
pub mod config;
pub mod entity;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod loader;
pub mod logging;
pub mod node;
pub mod relations;
pub mod subject;
pub mod tree;
pub mod value;

pub use arguments::{ArgKey, ArgMap, ArgValue, EagerArg, EagerLoadSpec, parse_arguments};
pub use config::{EnvSource, LoaderConfig, MapEnvSource, StdEnvSource};
pub use entity::{Entity, EntityRef, Record, Related, entity_ref};
pub use error::{EagerError, EagerResult, ErrorCode, ErrorContext, Suggestion};
pub use fetch::{Constraint, FetchQuery, Fetcher, MemoryStore, OrderByField, SortOrder, constraint};
pub use filter::Filter;
pub use loader::{EagerContext, Loaded, Loader};
pub use node::EagerLoad;
pub use relations::{
    RelationCatalog, RelationDescriptor, RelationKey, RelationKind, RelationRegistry, ThroughSpec,
};
pub use subject::{Element, NormalizedSubject, Resultset, Subject};
pub use tree::{ResolvedTree, build_tree};
pub use value::Value;

// Re-export logging utilities
pub use logging::{init as init_logging, is_debug_enabled};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::arguments::{ArgMap, EagerArg};
    pub use crate::entity::{Entity, EntityRef, Record, Related, entity_ref};
    pub use crate::error::{EagerError, EagerResult};
    pub use crate::fetch::{FetchQuery, Fetcher, MemoryStore, SortOrder, constraint};
    pub use crate::filter::Filter;
    pub use crate::loader::{EagerContext, Loaded, Loader};
    pub use crate::relations::{RelationCatalog, RelationDescriptor, RelationRegistry, ThroughSpec};
    pub use crate::subject::{Element, Resultset, Subject};
    pub use crate::value::Value;
}
