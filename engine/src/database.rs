//! Schema-driven entity façade (C6): desugars entity-level create/query/
//! delete calls into triples and store queries, applies fallback
//! substitution, and enforces required-field and filter-applicability
//! rules before anything reaches the store.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::id::Id;
use crate::query::{Datum, Filter, OrderDirection, Pattern, Query, Slot, Variable};
use crate::schema::{EntitySchema, FieldKind, Schema};
use crate::store::Store;
use crate::triple::Fact;
use crate::value::Value;

/// One declarative filter clause targeting a single field.
#[derive(Debug, Clone)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, op: FilterOp) -> Self {
        Self {
            field: field.into(),
            op,
        }
    }
}

/// The filter taxonomy: `isDefined` is common to every kind; the rest are
/// applicable only to the field kind named in their doc.
#[derive(Debug, Clone)]
pub enum FilterOp {
    /// Common to every kind.
    IsDefined(bool),
    /// number, string, boolean, ref
    Equals(Value),
    /// number, string, ref
    NotEquals(Value),
    /// number
    GreaterThan(f64),
    GreaterThanOrEqual(f64),
    LessThan(f64),
    LessThanOrEqual(f64),
    /// string
    Contains(String),
    StartsWith(String),
    EndsWith(String),
}

impl FilterOp {
    fn applicable_to(&self, kind: &FieldKind) -> bool {
        match self {
            FilterOp::IsDefined(_) => true,
            FilterOp::Equals(_) => true,
            // `notEquals` applies to every kind except boolean, per the
            // filter taxonomy (a boolean field only ever needs `equals`).
            FilterOp::NotEquals(_) => !matches!(kind, FieldKind::Boolean),
            FilterOp::GreaterThan(_)
            | FilterOp::GreaterThanOrEqual(_)
            | FilterOp::LessThan(_)
            | FilterOp::LessThanOrEqual(_) => matches!(kind, FieldKind::Number),
            FilterOp::Contains(_) | FilterOp::StartsWith(_) | FilterOp::EndsWith(_) => {
                matches!(kind, FieldKind::String)
            }
        }
    }

    fn value_kind_ok(&self, kind: &FieldKind) -> bool {
        match self {
            FilterOp::Equals(v) | FilterOp::NotEquals(v) => kind.matches(v),
            _ => true,
        }
    }
}

/// A request against one entity type: projected fields, filters,
/// ordering and limit. `fields` drives both the query's projection and
/// which keys appear in each returned object.
#[derive(Debug, Clone, Default)]
pub struct EntityQuery {
    pub fields: Vec<String>,
    pub filters: Vec<FieldFilter>,
    pub order_by: Vec<(String, OrderDirection)>,
    pub limit: Option<usize>,
}

impl EntityQuery {
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }
}

/// One instantiated entity: a `HashMap` rather than a statically typed
/// struct, because the schema, not the Rust type system, is the single
/// source of truth for shape. The `id` key carries the entity's own
/// identifier as `Value::Ref`.
pub type EntityRecord = HashMap<String, Value>;

/// Desugars schema-aware entity operations into triples and queries
/// against any [`Store`] implementation.
pub struct Database<S: Store> {
    schema: Schema,
    store: S,
}

impl<S: Store> Database<S> {
    pub fn new(schema: Schema, store: S) -> Self {
        Self { schema, store }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    fn entity_schema(&self, entity: &str) -> Result<&EntitySchema> {
        self.schema
            .entity(entity)
            .ok_or_else(|| Error::schema_mismatch(format!("unknown entity '{entity}'")))
    }

    /// `create(fields)`: validate required fields and types, stamp one
    /// HLC reading for the whole batch, write the identity fact plus one
    /// fact per supplied field, and return `{id, ...fields}`.
    pub async fn create(&mut self, entity: &str, fields: EntityRecord) -> Result<EntityRecord> {
        let schema = self.entity_schema(entity)?;

        for name in fields.keys() {
            if schema.field(name).is_none() {
                return Err(Error::validation(format!(
                    "entity '{entity}' has no field '{name}'"
                )));
            }
        }
        schema.validate_fields(&fields)?;

        let id = self.store.generate_id();
        let hlc = self.store.next_timestamp();

        let mut facts = Vec::with_capacity(fields.len() + 1);
        facts.push(Fact::new(
            id,
            Id::attribute(entity, "id"),
            Value::Ref(id),
            hlc,
        ));
        for (name, value) in &fields {
            facts.push(Fact::new(id, Id::attribute(entity, name), value.clone(), hlc));
        }

        self.store.add(facts).await?;

        let mut result = fields;
        result.insert("id".to_string(), Value::Ref(id));
        Ok(result)
    }

    /// `delete(id)`: delegates to the store's delete-by-entity.
    pub async fn delete(&mut self, id: Id) -> Result<()> {
        self.store.delete_all_by_id(id).await
    }

    /// `query({fields, where?, orderBy?, limit?})`: resolve the selected
    /// fields and filters into a store [`Query`], execute it, and project
    /// each surviving row into an [`EntityRecord`], substituting fallbacks
    /// for absent fields and omitting fields with neither a fact nor a
    /// fallback.
    pub async fn query(&self, entity: &str, request: EntityQuery) -> Result<Vec<EntityRecord>> {
        let schema = self.entity_schema(entity)?;

        for field in &request.fields {
            if field != "id" && schema.field(field).is_none() {
                return Err(Error::schema_mismatch(format!(
                    "entity '{entity}' has no field '{field}'"
                )));
            }
        }
        for filter in &request.filters {
            self.validate_filter(schema, filter)?;
        }

        let id_var = Variable::new("id");
        let mut query = Query::new(Vec::new());
        query.where_.push(Pattern::new(
            Slot::Var(id_var.clone()),
            Id::attribute(entity, "id"),
            Slot::var("__identity_value"),
        ));

        let mandatory_fields: std::collections::HashSet<&str> = request
            .filters
            .iter()
            .filter_map(|f| match f.op {
                FilterOp::IsDefined(true) => Some(f.field.as_str()),
                _ => None,
            })
            .collect();

        let mut field_vars: HashMap<String, Variable> = HashMap::new();
        let mut needed: Vec<&str> = request
            .fields
            .iter()
            .map(String::as_str)
            .filter(|f| *f != "id")
            .collect();
        for filter in &request.filters {
            if !matches!(filter.op, FilterOp::IsDefined(false)) && !needed.contains(&filter.field.as_str())
            {
                needed.push(filter.field.as_str());
            }
        }
        for (field, _) in &request.order_by {
            if field != "id" && !needed.contains(&field.as_str()) {
                needed.push(field.as_str());
            }
        }

        for field in needed {
            let var = Variable::new(field);
            let pattern = Pattern::new(
                Slot::Var(id_var.clone()),
                Id::attribute(entity, field),
                Slot::Var(var.clone()),
            );
            if mandatory_fields.contains(field) {
                query.where_.push(pattern);
            } else {
                query.optional.push(pattern);
            }
            field_vars.insert(field.to_string(), var);
        }

        for filter in &request.filters {
            if let FilterOp::IsDefined(false) = filter.op {
                let absence_var = Variable::new(format!("__absent_{}", filter.field));
                query.where_not.push(Pattern::new(
                    Slot::Var(id_var.clone()),
                    Id::attribute(entity, &filter.field),
                    Slot::Var(absence_var),
                ));
            }
        }

        for filter in &request.filters {
            if matches!(filter.op, FilterOp::IsDefined(_)) {
                continue;
            }
            let var = field_vars
                .get(&filter.field)
                .cloned()
                .expect("filtered field always has a pattern variable");
            let fallback = schema.field(&filter.field).and_then(|f| f.fallback.clone());
            query.filters.push(make_filter(var, filter.op.clone(), fallback));
        }

        // `find` carries every projected field plus every order-by key,
        // so ordering can reach fields the caller didn't select.
        let mut find_fields: Vec<String> = request.fields.clone();
        for (field, _) in &request.order_by {
            if !find_fields.contains(field) {
                find_fields.push(field.clone());
            }
        }
        query.find = find_fields
            .iter()
            .map(|f| {
                if f == "id" {
                    id_var.clone()
                } else {
                    field_vars
                        .entry(f.clone())
                        .or_insert_with(|| Variable::new(f.clone()))
                        .clone()
                }
            })
            .collect();

        query.order_by = request
            .order_by
            .iter()
            .map(|(f, dir)| {
                let var = if f == "id" {
                    id_var.clone()
                } else {
                    field_vars.get(f).cloned().unwrap_or_else(|| Variable::new(f.clone()))
                };
                (var, *dir)
            })
            .collect();
        query.limit = request.limit;

        let rows = self.store.query(&query).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut record = EntityRecord::new();
            for (field, datum) in find_fields.iter().zip(row.iter()) {
                if !request.fields.contains(field) {
                    continue;
                }
                match datum {
                    Some(Datum::Id(id)) => {
                        record.insert(field.clone(), Value::Ref(*id));
                    }
                    Some(Datum::Value(v)) => {
                        record.insert(field.clone(), v.clone());
                    }
                    None => {
                        if let Some(fallback) = schema.field(field).and_then(|f| f.fallback.clone()) {
                            record.insert(field.clone(), fallback);
                        }
                    }
                }
            }
            out.push(record);
        }
        Ok(out)
    }

    fn validate_filter(&self, schema: &EntitySchema, filter: &FieldFilter) -> Result<()> {
        if filter.field == "id" {
            return match &filter.op {
                FilterOp::IsDefined(_) | FilterOp::Equals(_) | FilterOp::NotEquals(_) => Ok(()),
                _ => Err(Error::schema_mismatch(
                    "field 'id' supports only equals/notEquals/isDefined",
                )),
            };
        }
        let field = schema.field(&filter.field).ok_or_else(|| {
            Error::schema_mismatch(format!(
                "entity has no field '{}' to filter on",
                filter.field
            ))
        })?;
        if !filter.op.applicable_to(&field.kind) {
            return Err(Error::schema_mismatch(format!(
                "filter not applicable to field '{}' of kind {}",
                filter.field,
                field.kind.type_name()
            )));
        }
        if !filter.op.value_kind_ok(&field.kind) {
            return Err(Error::schema_mismatch(format!(
                "filter value does not match field '{}' of kind {}",
                filter.field,
                field.kind.type_name()
            )));
        }
        Ok(())
    }
}

fn make_filter(var: Variable, op: FilterOp, fallback: Option<Value>) -> Filter {
    Filter::new(var, move |datum: Option<&Datum>| {
        let value = resolve(datum, &fallback);
        match &op {
            FilterOp::Equals(target) => value.as_ref() == Some(target),
            FilterOp::NotEquals(target) => value.as_ref() != Some(target),
            FilterOp::GreaterThan(n) => value.as_ref().and_then(Value::as_f64).is_some_and(|v| v > *n),
            FilterOp::GreaterThanOrEqual(n) => {
                value.as_ref().and_then(Value::as_f64).is_some_and(|v| v >= *n)
            }
            FilterOp::LessThan(n) => value.as_ref().and_then(Value::as_f64).is_some_and(|v| v < *n),
            FilterOp::LessThanOrEqual(n) => {
                value.as_ref().and_then(Value::as_f64).is_some_and(|v| v <= *n)
            }
            FilterOp::Contains(s) => value.as_ref().and_then(Value::as_str).is_some_and(|v| v.contains(s.as_str())),
            FilterOp::StartsWith(s) => {
                value.as_ref().and_then(Value::as_str).is_some_and(|v| v.starts_with(s.as_str()))
            }
            FilterOp::EndsWith(s) => {
                value.as_ref().and_then(Value::as_str).is_some_and(|v| v.ends_with(s.as_str()))
            }
            FilterOp::IsDefined(_) => {
                unreachable!("isDefined is translated into where/whereNot patterns, never a Filter")
            }
        }
    })
}

fn resolve(datum: Option<&Datum>, fallback: &Option<Value>) -> Option<Value> {
    match datum {
        Some(Datum::Value(v)) => Some(v.clone()),
        Some(Datum::Id(id)) => Some(Value::Ref(*id)),
        None => fallback.clone(),
    }
}
