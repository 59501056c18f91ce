//! Eager-load arguments and their canonical form.
//!
//! Relation paths can be passed in two shapes:
//!
//! - a flat list of dotted path strings: `["posts", "posts.comments"]`
//! - a single map whose named entries are `path => constraint` and whose
//!   indexed entries are plain paths
//!
//! [`parse_arguments`] turns either shape into an [`EagerLoadSpec`], an
//! ordered map from full path to an optional constraint.
//!
//! ```rust
//! use eagerly_loader::arguments::{ArgMap, EagerArg, parse_arguments};
//! use eagerly_loader::fetch::SortOrder;
//!
//! let spec = parse_arguments(vec![EagerArg::from(
//!     ArgMap::new()
//!         .path("author")
//!         .constrained("comments", |q| {
//!             q.order_by("created_at", SortOrder::Desc);
//!         }),
//! )])
//! .unwrap();
//!
//! assert_eq!(spec.len(), 2);
//! assert!(spec.get("author").unwrap().is_none());
//! assert!(spec.get("comments").unwrap().is_some());
//! ```

use std::fmt;

use indexmap::IndexMap;

use crate::error::{EagerError, EagerResult};
use crate::fetch::{Constraint, FetchQuery};
use crate::value::Value;

/// One raw eager-load argument.
#[derive(Clone)]
pub enum EagerArg {
    /// A dotted relation path.
    Path(String),
    /// A map of paths and constraints.
    Map(ArgMap),
    /// Any other value; ignored by the parser.
    Value(Value),
}

impl From<&str> for EagerArg {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for EagerArg {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl From<ArgMap> for EagerArg {
    fn from(map: ArgMap) -> Self {
        Self::Map(map)
    }
}

impl From<Value> for EagerArg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl fmt::Debug for EagerArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

/// Key of an [`ArgMap`] entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgKey {
    /// A named key, read as a relation path.
    Name(String),
    /// A positional key.
    Index(usize),
}

/// Value of an [`ArgMap`] entry.
#[derive(Clone)]
pub enum ArgValue {
    /// A constraint for the path named by the key.
    Constraint(Constraint),
    /// A relation path (meaningful under an index key).
    Path(String),
    /// Any other value.
    Value(Value),
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constraint(_) => f.write_str("Constraint(..)"),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

/// Ordered map argument.
#[derive(Debug, Clone, Default)]
pub struct ArgMap {
    entries: Vec<(ArgKey, ArgValue)>,
}

impl ArgMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw entry.
    pub fn entry(mut self, key: ArgKey, value: ArgValue) -> Self {
        self.entries.push((key, value));
        self
    }

    /// Add a path without a constraint under the next positional key.
    pub fn path(self, path: impl Into<String>) -> Self {
        let index = self.entries.len();
        self.entry(ArgKey::Index(index), ArgValue::Path(path.into()))
    }

    /// Add a path with a constraint.
    pub fn constrained<F>(self, path: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut FetchQuery) + Send + Sync + 'static,
    {
        self.entry(
            ArgKey::Name(path.into()),
            ArgValue::Constraint(crate::fetch::constraint(f)),
        )
    }

    /// Add a named path whose value is not a constraint.
    pub fn named(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entry(ArgKey::Name(path.into()), ArgValue::Value(value.into()))
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[(ArgKey, ArgValue)] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical eager-load set: full path to optional constraint.
#[derive(Clone, Default)]
pub struct EagerLoadSpec {
    paths: IndexMap<String, Option<Constraint>>,
}

impl EagerLoadSpec {
    /// Create an empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path. A repeated path replaces the earlier constraint.
    pub fn insert(&mut self, path: impl Into<String>, constraint: Option<Constraint>) {
        self.paths.insert(path.into(), constraint);
    }

    /// Get the constraint registered for a path.
    ///
    /// The outer `Option` tells whether the path is registered at all.
    pub fn get(&self, path: &str) -> Option<Option<&Constraint>> {
        self.paths.get(path).map(Option::as_ref)
    }

    /// Check if a path is registered.
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains_key(path)
    }

    /// Paths in registration order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }

    /// Entries in lexicographic path order.
    pub fn sorted(&self) -> Vec<(&str, Option<&Constraint>)> {
        let mut entries: Vec<_> = self
            .paths
            .iter()
            .map(|(path, constraint)| (path.as_str(), constraint.as_ref()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Number of registered paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check if no path is registered.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl fmt::Debug for EagerLoadSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.paths
                    .iter()
                    .map(|(path, c)| (path, if c.is_some() { "constrained" } else { "-" })),
            )
            .finish()
    }
}

/// Parse raw arguments into an [`EagerLoadSpec`].
pub fn parse_arguments(args: Vec<EagerArg>) -> EagerResult<EagerLoadSpec> {
    if args.is_empty() {
        return Err(EagerError::empty_arguments());
    }

    let mut spec = EagerLoadSpec::new();

    if let [EagerArg::Map(map)] = args.as_slice() {
        for (key, value) in map.entries() {
            match (key, value) {
                (ArgKey::Name(path), ArgValue::Constraint(c)) => {
                    spec.insert(path.clone(), Some(c.clone()))
                }
                (ArgKey::Name(path), _) => spec.insert(path.clone(), None),
                (ArgKey::Index(_), ArgValue::Path(path)) => spec.insert(path.clone(), None),
                (ArgKey::Index(_), _) => {}
            }
        }
    } else {
        for arg in args {
            if let EagerArg::Path(path) = arg {
                spec.insert(path, None);
            }
        }
    }

    if spec.is_empty() {
        return Err(EagerError::invalid_argument("No relation paths were supplied"));
    }

    Ok(spec)
}
