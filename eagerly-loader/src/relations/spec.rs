//! Relation descriptor types.

use std::fmt;

/// Kind of relation between entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Many-to-one relation (e.g., Post belongs to User).
    BelongsTo,
    /// One-to-one relation (e.g., User has one Profile).
    HasOne,
    /// One-to-many relation (e.g., User has many Posts).
    HasMany,
    /// Many-to-many relation through an intermediate entity (e.g., Post has
    /// many Tags through PostTag).
    HasManyThrough,
    /// One-to-one relation through an intermediate entity. Catalogs may
    /// describe it but it cannot be eager loaded.
    HasOneThrough,
}

impl RelationKind {
    /// Check if this kind can be eager loaded.
    pub fn is_eager_loadable(&self) -> bool {
        matches!(
            self,
            Self::BelongsTo | Self::HasOne | Self::HasMany | Self::HasManyThrough
        )
    }

    /// Check if this relation yields at most one entity per parent.
    pub fn is_one(&self) -> bool {
        matches!(self, Self::BelongsTo | Self::HasOne | Self::HasOneThrough)
    }

    /// Check if this relation yields any number of entities per parent.
    pub fn is_many(&self) -> bool {
        matches!(self, Self::HasMany | Self::HasManyThrough)
    }

    /// Check if the relation goes through an intermediate entity.
    pub fn is_through(&self) -> bool {
        matches!(self, Self::HasManyThrough | Self::HasOneThrough)
    }

    /// Get the snake_case name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BelongsTo => "belongs_to",
            Self::HasOne => "has_one",
            Self::HasMany => "has_many",
            Self::HasManyThrough => "has_many_through",
            Self::HasOneThrough => "has_one_through",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field(s) a relation joins on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationKey {
    /// A single scalar field.
    Single(String),
    /// Several fields matched together.
    Composite(Vec<String>),
}

impl RelationKey {
    /// Create a single-field key.
    pub fn single(field: impl Into<String>) -> Self {
        Self::Single(field.into())
    }

    /// Create a multi-field key.
    pub fn composite(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Composite(fields.into_iter().map(Into::into).collect())
    }

    /// Get the field name of a single-field key.
    pub fn as_single(&self) -> Option<&str> {
        match self {
            Self::Single(field) => Some(field),
            Self::Composite(_) => None,
        }
    }

    /// Check if this key spans more than one field.
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Composite(_))
    }

    /// All fields of the key.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::Single(field) => vec![field.as_str()],
            Self::Composite(fields) => fields.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for RelationKey {
    fn from(field: &str) -> Self {
        Self::single(field)
    }
}

impl From<String> for RelationKey {
    fn from(field: String) -> Self {
        Self::Single(field)
    }
}

impl fmt::Display for RelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(field) => f.write_str(field),
            Self::Composite(fields) => write!(f, "({})", fields.join(", ")),
        }
    }
}

/// Intermediate entity of a through relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThroughSpec {
    /// Intermediate entity type.
    pub entity_type: String,
    /// Field on the intermediate entity matching the parent's local key.
    pub fields: RelationKey,
    /// Field on the intermediate entity matching the target's referenced key.
    pub referenced_fields: RelationKey,
}

impl ThroughSpec {
    /// Create a new through spec.
    pub fn new(
        entity_type: impl Into<String>,
        fields: impl Into<RelationKey>,
        referenced_fields: impl Into<RelationKey>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            fields: fields.into(),
            referenced_fields: referenced_fields.into(),
        }
    }
}

/// Metadata describing one relation of an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDescriptor {
    /// Alias the relation is reachable under.
    pub alias: String,
    /// Kind of relation.
    pub kind: RelationKind,
    /// Key on the owning entity.
    pub fields: RelationKey,
    /// Entity type the relation points to.
    pub referenced_entity_type: String,
    /// Key on the referenced entity.
    pub referenced_fields: RelationKey,
    /// Intermediate entity for through relations.
    pub through: Option<ThroughSpec>,
}

impl RelationDescriptor {
    fn direct(
        kind: RelationKind,
        alias: impl Into<String>,
        fields: impl Into<RelationKey>,
        referenced_entity_type: impl Into<String>,
        referenced_fields: impl Into<RelationKey>,
    ) -> Self {
        Self {
            alias: alias.into(),
            kind,
            fields: fields.into(),
            referenced_entity_type: referenced_entity_type.into(),
            referenced_fields: referenced_fields.into(),
            through: None,
        }
    }

    /// Create a belongs-to relation: `fields` is the foreign key on the owner,
    /// `referenced_fields` the key it points at.
    pub fn belongs_to(
        alias: impl Into<String>,
        fields: impl Into<RelationKey>,
        referenced_entity_type: impl Into<String>,
        referenced_fields: impl Into<RelationKey>,
    ) -> Self {
        Self::direct(RelationKind::BelongsTo, alias, fields, referenced_entity_type, referenced_fields)
    }

    /// Create a has-one relation: `referenced_fields` is the foreign key on
    /// the referenced entity.
    pub fn has_one(
        alias: impl Into<String>,
        fields: impl Into<RelationKey>,
        referenced_entity_type: impl Into<String>,
        referenced_fields: impl Into<RelationKey>,
    ) -> Self {
        Self::direct(RelationKind::HasOne, alias, fields, referenced_entity_type, referenced_fields)
    }

    /// Create a has-many relation: `referenced_fields` is the foreign key on
    /// the referenced entity.
    pub fn has_many(
        alias: impl Into<String>,
        fields: impl Into<RelationKey>,
        referenced_entity_type: impl Into<String>,
        referenced_fields: impl Into<RelationKey>,
    ) -> Self {
        Self::direct(RelationKind::HasMany, alias, fields, referenced_entity_type, referenced_fields)
    }

    /// Create a has-many-through relation.
    pub fn has_many_through(
        alias: impl Into<String>,
        fields: impl Into<RelationKey>,
        through: ThroughSpec,
        referenced_entity_type: impl Into<String>,
        referenced_fields: impl Into<RelationKey>,
    ) -> Self {
        let mut spec = Self::direct(
            RelationKind::HasManyThrough,
            alias,
            fields,
            referenced_entity_type,
            referenced_fields,
        );
        spec.through = Some(through);
        spec
    }

    /// Create a has-one-through relation.
    pub fn has_one_through(
        alias: impl Into<String>,
        fields: impl Into<RelationKey>,
        through: ThroughSpec,
        referenced_entity_type: impl Into<String>,
        referenced_fields: impl Into<RelationKey>,
    ) -> Self {
        let mut spec = Self::direct(
            RelationKind::HasOneThrough,
            alias,
            fields,
            referenced_entity_type,
            referenced_fields,
        );
        spec.through = Some(through);
        spec
    }

    /// Check if any key involved in the relation is composite.
    pub fn has_composite_key(&self) -> bool {
        self.fields.is_composite()
            || self.referenced_fields.is_composite()
            || self
                .through
                .as_ref()
                .is_some_and(|t| t.fields.is_composite() || t.referenced_fields.is_composite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_kind() {
        assert!(RelationKind::HasMany.is_many());
        assert!(RelationKind::HasManyThrough.is_many());
        assert!(RelationKind::BelongsTo.is_one());
        assert!(RelationKind::HasManyThrough.is_through());
        assert!(!RelationKind::HasOneThrough.is_eager_loadable());
        assert_eq!(RelationKind::HasManyThrough.to_string(), "has_many_through");
    }

    #[test]
    fn test_relation_key() {
        let key = RelationKey::from("user_id");
        assert_eq!(key.as_single(), Some("user_id"));
        let key = RelationKey::composite(["tenant_id", "user_id"]);
        assert!(key.is_composite());
        assert_eq!(key.fields(), vec!["tenant_id", "user_id"]);
        assert_eq!(key.to_string(), "(tenant_id, user_id)");
    }

    #[test]
    fn test_descriptor_constructors() {
        let spec = RelationDescriptor::has_many("posts", "id", "Post", "user_id");
        assert_eq!(spec.kind, RelationKind::HasMany);
        assert_eq!(spec.referenced_entity_type, "Post");
        assert!(!spec.has_composite_key());

        let spec = RelationDescriptor::has_many_through(
            "tags",
            "id",
            ThroughSpec::new("PostTag", "post_id", RelationKey::composite(["tag_id", "x"])),
            "Tag",
            "id",
        );
        assert!(spec.has_composite_key());
    }
}
