//! Error types for eager loading with actionable messages.
//!
//! Every failure the loader can raise carries:
//! - An error code for programmatic handling
//! - Context about the model, relation alias or path involved
//! - Suggestions for fixing the problem
//!
//! # Error Codes
//!
//! Error codes follow a pattern: EL{category}{number}
//! - 1xxx: Input errors (subject, arguments, aliases)
//! - 2xxx: Relation metadata errors (missing relation, unsupported shape)
//! - 3xxx: Fetch errors (raised by `Fetcher` implementations)
//! - 7xxx: Configuration errors
//! - 9xxx: Internal errors
//!
//! ```rust
//! use eagerly_loader::{EagerError, ErrorCode};
//!
//! let err = EagerError::relation_not_found("User", "posts");
//! assert_eq!(err.code, ErrorCode::RelationNotFound);
//! assert!(err.to_string().contains("User"));
//! assert!(err.to_string().contains("posts"));
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for eager loading operations.
pub type EagerResult<T> = Result<T, EagerError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Input errors (1xxx)
    /// The subject is malformed or heterogeneous (EL1001).
    InvalidSubject = 1001,
    /// A relation alias passed to `add_eager_load` is unusable (EL1002).
    InvalidRelationAlias = 1002,
    /// No eager-load arguments were supplied (EL1003).
    EmptyArguments = 1003,
    /// The eager-load arguments contain no usable relation path (EL1004).
    InvalidArgument = 1004,

    // Relation metadata errors (2xxx)
    /// No relation is defined for the model under the alias (EL2001).
    RelationNotFound = 2001,
    /// The relation kind cannot be eager loaded (EL2002).
    UnsupportedRelationKind = 2002,
    /// The relation uses a multi-field key (EL2003).
    CompositeKeyUnsupported = 2003,

    // Fetch errors (3xxx)
    /// A batched fetch failed (EL3001).
    FetchFailed = 3001,

    // Configuration errors (7xxx)
    /// Invalid configuration (EL7001).
    InvalidConfiguration = 7001,

    // Internal errors (9xxx)
    /// Internal error (EL9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "EL2001").
    pub fn code(&self) -> String {
        format!("EL{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidSubject => "Invalid eager-loading subject",
            Self::InvalidRelationAlias => "Invalid relation alias",
            Self::EmptyArguments => "Empty eager-load arguments",
            Self::InvalidArgument => "Invalid eager-load argument",
            Self::RelationNotFound => "Relation not found",
            Self::UnsupportedRelationKind => "Unsupported relation kind",
            Self::CompositeKeyUnsupported => "Composite relation key",
            Self::FetchFailed => "Fetch failed",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Suggestion for fixing an error.
#[derive(Debug, Clone)]
pub struct Suggestion {
    /// The suggestion text.
    pub text: String,
    /// Optional code example.
    pub code: Option<String>,
}

impl Suggestion {
    /// Create a new suggestion.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: None,
        }
    }

    /// Add a code example.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The model (entity type) involved.
    pub model: Option<String>,
    /// The relation alias involved.
    pub alias: Option<String>,
    /// The full relation path being resolved.
    pub path: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<Suggestion>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors that can occur while resolving or executing eager loads.
#[derive(Error, Debug)]
pub struct EagerError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for EagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl EagerError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(Suggestion::new(suggestion));
        self
    }

    /// Add a code suggestion.
    pub fn with_code_suggestion(mut self, text: impl Into<String>, code: impl Into<String>) -> Self {
        self.context
            .suggestions
            .push(Suggestion::new(text).with_code(code));
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.context.model = Some(model.into());
        self
    }

    /// Set the relation alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.context.alias = Some(alias.into());
        self
    }

    /// Set the relation path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.context.path = Some(path.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// Create an invalid subject error.
    pub fn invalid_subject(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidSubject,
            format!(
                "Expected the subject to be an entity, a resultset or a collection of entities of one type: {}",
                detail.into()
            ),
        )
        .with_suggestion("Pass a single entity, a resultset, or entities sharing one entity type")
    }

    /// Create an invalid relation alias error.
    pub fn invalid_relation_alias(alias: impl Into<String>, detail: impl Into<String>) -> Self {
        let alias = alias.into();
        Self::new(
            ErrorCode::InvalidRelationAlias,
            format!("Invalid relation alias `{}`: {}", alias, detail.into()),
        )
        .with_alias(&alias)
        .with_code_suggestion(
            "Use a non-empty dotted path of relation aliases",
            "loader.add_eager_load(\"posts.comments\", None)",
        )
    }

    /// Create an empty arguments error.
    pub fn empty_arguments() -> Self {
        Self::new(ErrorCode::EmptyArguments, "Eager-load arguments can not be empty")
            .with_suggestion("Pass at least one relation path")
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, detail)
            .with_help("Arguments are either relation path strings or a single map of path => constraint")
    }

    /// Create a relation not found error.
    pub fn relation_not_found(model: impl Into<String>, alias: impl Into<String>) -> Self {
        let model = model.into();
        let alias = alias.into();
        Self::new(
            ErrorCode::RelationNotFound,
            format!(
                "There is no defined relation for the model `{}` using alias `{}`",
                model, alias
            ),
        )
        .with_model(&model)
        .with_alias(&alias)
        .with_suggestion(format!("Register the `{}` relation on `{}` in the relation catalog", alias, model))
    }

    /// Create an unsupported relation kind error.
    pub fn unsupported_relation_kind(kind: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::UnsupportedRelationKind,
            format!("Unknown relation type `{}`", kind),
        )
        .with_help("Only belongs_to, has_one, has_many and has_many_through relations can be eager loaded")
    }

    /// Create a composite key error.
    pub fn composite_key(model: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::CompositeKeyUnsupported,
            "Relations with composite keys are not supported",
        )
        .with_model(model)
        .with_alias(alias)
    }

    /// Create a fetch failure error.
    pub fn fetch_failed(model: impl Into<String>, detail: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::FetchFailed,
            format!("Failed to fetch {} records: {}", model, detail.into()),
        )
        .with_model(&model)
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, detail)
    }

    /// Create an internal error.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, detail)
    }

    // ============== Predicates ==============

    /// Check if this is an invalid subject error.
    pub fn is_invalid_subject(&self) -> bool {
        self.code == ErrorCode::InvalidSubject
    }

    /// Check if this is a relation not found error.
    pub fn is_relation_not_found(&self) -> bool {
        self.code == ErrorCode::RelationNotFound
    }

    /// Check if the error was raised before any fetch happened.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::InvalidSubject
                | ErrorCode::InvalidRelationAlias
                | ErrorCode::EmptyArguments
                | ErrorCode::InvalidArgument
                | ErrorCode::RelationNotFound
                | ErrorCode::UnsupportedRelationKind
                | ErrorCode::CompositeKeyUnsupported
        )
    }

    /// Format the error with suggestions and help for display.
    pub fn display_full(&self) -> String {
        let mut out = self.to_string();
        if let Some(ref path) = self.context.path {
            out.push_str(&format!("\n  path: {}", path));
        }
        for suggestion in &self.context.suggestions {
            out.push_str(&format!("\n  suggestion: {}", suggestion.text));
            if let Some(ref code) = suggestion.code {
                out.push_str(&format!("\n    {}", code));
            }
        }
        if let Some(ref help) = self.context.help {
            out.push_str(&format!("\n  help: {}", help));
        }
        out
    }
}
