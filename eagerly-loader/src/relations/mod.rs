//! Relation metadata consumed by the tree builder.
//!
//! This module provides:
//! - `RelationDescriptor` describing how two entity types join
//! - `RelationCatalog`, the lookup the loader resolves aliases through
//! - `RelationRegistry`, an in-memory catalog
//!
//! ## Example
//!
//! ```rust
//! use eagerly_loader::relations::{RelationCatalog, RelationDescriptor, RelationRegistry};
//!
//! let catalog = RelationRegistry::new()
//!     .with("User", RelationDescriptor::has_many("posts", "id", "Post", "user_id"))
//!     .with("Post", RelationDescriptor::belongs_to("author", "user_id", "User", "id"));
//!
//! let posts = catalog.lookup("User", "posts").unwrap();
//! assert_eq!(posts.referenced_entity_type, "Post");
//! ```

mod catalog;
mod spec;

pub use catalog::{RelationCatalog, RelationRegistry};
pub use spec::{RelationDescriptor, RelationKey, RelationKind, ThroughSpec};
