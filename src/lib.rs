//! # Eagerly
//!
//! Batched, dependency-ordered eager loading of related records.
//!
//! Eagerly removes N+1 query patterns: every relation level of a set of
//! dotted relation paths is fetched once for all parent entities, and the
//! results are attached onto the caller's own entities.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use eagerly::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> EagerResult<()> {
//! let store = Arc::new(MemoryStore::new());
//! let post = store.insert(Record::new("Post").with("id", 1).with("user_id", 7));
//! store.insert(Record::new("User").with("id", 7).with("name", "ada"));
//!
//! let catalog = RelationRegistry::new()
//!     .with("Post", RelationDescriptor::belongs_to("author", "user_id", "User", "id"));
//! let ctx = EagerContext::new(catalog, store);
//!
//! let post = Loader::load_entity(&ctx, post, vec!["author".into()]).await?;
//! let guard = post.read();
//! let author = guard.related("author").and_then(|r| r.as_one()).unwrap();
//! assert_eq!(author.read().attribute("name"), Some(Value::from("ada")));
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The loader implementation.
pub mod loader {
    pub use eagerly_loader::*;
}

/// Logging setup.
pub mod logging {
    pub use eagerly_loader::logging::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use eagerly_loader::prelude::*;
}

// Re-export key types at the crate root
pub use eagerly_loader::{
    EagerContext, EagerError, EagerResult, ErrorCode, Loaded, Loader, LoaderConfig,
};
