//! Declarative entity/field model (C3): validation, reserved-field and
//! scope checks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::Value;

/// Field names reserved for synthetic/identity facts; rejected at schema
/// construction regardless of scope.
const RESERVED_FIELDS: &[&str] = &[
    "id",
    "createTime",
    "createdAt",
    "updateTime",
    "updatedAt",
    "creator",
    "createdBy",
];

/// The runtime kind of a field's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    /// A reference to an entity of `target`, carried as a plain identifier.
    Ref { target: String },
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Ref { .. } => "ref",
        }
    }

    /// Whether a runtime value's tag matches this field's declared kind.
    pub fn matches(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (FieldKind::String, Value::String(_))
                | (FieldKind::Number, Value::Number(_))
                | (FieldKind::Boolean, Value::Boolean(_))
                | (FieldKind::Ref { .. }, Value::Ref(_))
        )
    }
}

/// A single field's declaration within an [`EntitySchema`].
///
/// Construction rule: if `optional` is `false` (the default), `fallback`
/// must be set. This is enforced by [`EntitySchema::new`], not by this
/// type alone, since the check spans multiple fields at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Value>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
            fallback: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_fallback(mut self, fallback: impl Into<FallbackValue>) -> Self {
        self.fallback = Some(fallback.into().0);
        self
    }

    fn validate_construction(&self) -> Result<()> {
        if RESERVED_FIELDS.contains(&self.name.as_str()) {
            return Err(Error::validation(format!(
                "field name '{}' is reserved",
                self.name
            )));
        }
        if !self.optional && self.fallback.is_none() {
            return Err(Error::validation(format!(
                "field '{}' is required but has no fallback, mark it optional() or supply with_fallback()",
                self.name
            )));
        }
        Ok(())
    }

    fn validate_value(&self, value: &Value) -> Result<()> {
        if self.kind.matches(value) {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "field '{}' expects {}, got {}",
                self.name,
                self.kind.type_name(),
                value.type_name()
            )))
        }
    }
}

/// Wrapper allowing `with_fallback` to accept bare literals ergonomically.
pub struct FallbackValue(pub Value);

impl From<&str> for FallbackValue {
    fn from(v: &str) -> Self {
        FallbackValue(Value::String(v.to_string()))
    }
}
impl From<String> for FallbackValue {
    fn from(v: String) -> Self {
        FallbackValue(Value::String(v))
    }
}
impl From<f64> for FallbackValue {
    fn from(v: f64) -> Self {
        FallbackValue(Value::Number(v))
    }
}
impl From<bool> for FallbackValue {
    fn from(v: bool) -> Self {
        FallbackValue(Value::Boolean(v))
    }
}
impl From<Value> for FallbackValue {
    fn from(v: Value) -> Self {
        FallbackValue(v)
    }
}

/// The field set for one entity name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySchema {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl EntitySchema {
    /// Construct an entity schema, rejecting reserved field names and
    /// required fields with no fallback up front.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Result<Self> {
        for field in &fields {
            field.validate_construction()?;
        }
        Ok(Self {
            name: name.into(),
            fields,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// `validate(entityName, proposedFields)`: every non-optional field
    /// must be present; every supplied field's runtime type must match
    /// its kind.
    pub fn validate_fields(&self, proposed: &HashMap<String, Value>) -> Result<()> {
        for field in &self.fields {
            match proposed.get(&field.name) {
                None if !field.optional => {
                    return Err(Error::validation(format!(
                        "missing required field '{}'",
                        field.name
                    )));
                }
                None => {}
                Some(value) => field.validate_value(value)?,
            }
        }
        Ok(())
    }
}

/// Which scope an entity's schema was declared in. Entity names must be
/// unique across scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityScope {
    Shared,
    User,
}

/// The full, immutable schema: entity name -> field declarations, with
/// scope tracked per entity.
///
/// The legacy flat `{entities}` constructor form is accepted as a
/// deprecated alias for `shared` and desugared at construction time.
/// [`Schema`] never carries the legacy representation internally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    entities: HashMap<String, EntitySchema>,
    scopes: HashMap<String, EntityScope>,
}

impl Schema {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            scopes: HashMap::new(),
        }
    }

    /// Deprecated alias for constructing from a flat `entities` map,
    /// matching the source ecosystem's legacy schema form. Equivalent to
    /// adding every entity to the `shared` scope.
    #[deprecated(note = "use Schema::new() and add_entity with explicit scopes")]
    pub fn from_legacy_entities(entities: Vec<EntitySchema>) -> Result<Self> {
        let mut schema = Schema::new();
        for entity in entities {
            schema.add_entity_scoped(entity, EntityScope::Shared)?;
        }
        Ok(schema)
    }

    /// Add an entity to the `shared` scope.
    pub fn add_entity(&mut self, entity: EntitySchema) -> Result<&mut Self> {
        self.add_entity_scoped(entity, EntityScope::Shared)
    }

    /// Add an entity to the `user` scope.
    pub fn add_user_entity(&mut self, entity: EntitySchema) -> Result<&mut Self> {
        self.add_entity_scoped(entity, EntityScope::User)
    }

    fn add_entity_scoped(&mut self, entity: EntitySchema, scope: EntityScope) -> Result<&mut Self> {
        if self.entities.contains_key(&entity.name) {
            return Err(Error::validation(format!(
                "entity '{}' is already declared in another scope",
                entity.name
            )));
        }
        self.scopes.insert(entity.name.clone(), scope);
        self.entities.insert(entity.name.clone(), entity);
        Ok(self)
    }

    pub fn entity(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.get(name)
    }

    pub fn scope_of(&self, name: &str) -> Option<EntityScope> {
        self.scopes.get(name).copied()
    }

    /// All entities in the `shared` scope.
    pub fn shared(&self) -> impl Iterator<Item = &EntitySchema> {
        self.entities
            .iter()
            .filter(move |(name, _)| self.scopes.get(*name) == Some(&EntityScope::Shared))
            .map(|(_, schema)| schema)
    }

    /// All entities in the `user` scope.
    pub fn user(&self) -> impl Iterator<Item = &EntitySchema> {
        self.entities
            .iter()
            .filter(move |(name, _)| self.scopes.get(*name) == Some(&EntityScope::User))
            .map(|(_, schema)| schema)
    }

    /// The merged view across both scopes.
    pub fn entities(&self) -> impl Iterator<Item = &EntitySchema> {
        self.entities.values()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_schema() -> EntitySchema {
        EntitySchema::new(
            "users",
            vec![
                FieldDef::new("name", FieldKind::String).with_fallback(""),
                FieldDef::new("age", FieldKind::Number).optional(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn reserved_field_rejected() {
        let result = EntitySchema::new(
            "users",
            vec![FieldDef::new("createdAt", FieldKind::String).optional()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn required_without_fallback_rejected() {
        let result = EntitySchema::new("users", vec![FieldDef::new("name", FieldKind::String)]);
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_entity_across_scopes_rejected() {
        let mut schema = Schema::new();
        schema.add_entity(users_schema()).unwrap();
        let err = schema.add_user_entity(users_schema()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[test]
    fn validate_fields_required_missing() {
        let entity = users_schema();
        let proposed = HashMap::new();
        // name has a fallback so it's not "required" in the optional sense,
        // but it is still not `optional`: fallback only governs query-time
        // projection, not create-time validation.
        let result = entity.validate_fields(&proposed);
        assert!(result.is_err());
    }

    #[test]
    fn validate_fields_type_mismatch() {
        let entity = users_schema();
        let mut proposed = HashMap::new();
        proposed.insert("name".to_string(), Value::Number(1.0));
        assert!(entity.validate_fields(&proposed).is_err());
    }

    #[test]
    fn scoped_views_partition_entities() {
        let mut schema = Schema::new();
        schema.add_entity(users_schema()).unwrap();
        schema
            .add_user_entity(EntitySchema::new("drafts", vec![]).unwrap())
            .unwrap();
        assert_eq!(schema.shared().count(), 1);
        assert_eq!(schema.user().count(), 1);
        assert_eq!(schema.entities().count(), 2);
    }

    #[allow(deprecated)]
    #[test]
    fn legacy_constructor_is_shared_scope() {
        let schema = Schema::from_legacy_entities(vec![users_schema()]).unwrap();
        assert_eq!(schema.scope_of("users"), Some(EntityScope::Shared));
    }
}
