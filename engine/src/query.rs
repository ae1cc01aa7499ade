//! Datalog-style query engine (C5): binding context, conjunction, optional,
//! negation, filters, ordering and limit.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::id::Id;
use crate::value::Value;

/// A nominal query variable. Two variables are equal iff their names are
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variable(pub String);

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Variable(name.into())
    }
}

impl From<&str> for Variable {
    fn from(s: &str) -> Self {
        Variable(s.to_string())
    }
}

/// A bound datum: either an identifier (entity/attribute position) or a
/// primitive value (value position).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Datum {
    Id(Id),
    Value(Value),
}

impl From<Id> for Datum {
    fn from(id: Id) -> Self {
        Datum::Id(id)
    }
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        Datum::Value(value)
    }
}

/// One slot of a [`Pattern`]: either a literal datum or a variable to bind.
#[derive(Debug, Clone)]
pub enum Slot {
    Literal(Datum),
    Var(Variable),
}

impl Slot {
    pub fn var(name: impl Into<String>) -> Self {
        Slot::Var(Variable::new(name))
    }
}

impl From<Id> for Slot {
    fn from(id: Id) -> Self {
        Slot::Literal(Datum::Id(id))
    }
}

impl From<Value> for Slot {
    fn from(value: Value) -> Self {
        Slot::Literal(Datum::Value(value))
    }
}

impl From<Variable> for Slot {
    fn from(v: Variable) -> Self {
        Slot::Var(v)
    }
}

/// A query clause with three slots: `(entitySlot, attributeSlot,
/// valueSlot)`.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub entity: Slot,
    pub attribute: Slot,
    pub value: Slot,
}

impl Pattern {
    pub fn new(entity: impl Into<Slot>, attribute: impl Into<Slot>, value: impl Into<Slot>) -> Self {
        Self {
            entity: entity.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    fn resolve_slot<'a>(slot: &'a Slot, ctx: &'a BindingContext) -> Option<&'a Datum> {
        match slot {
            Slot::Literal(d) => Some(d),
            Slot::Var(v) => ctx.get(v),
        }
    }
}

/// An immutable variable -> datum mapping. Cloning is `O(1)` (a reference
/// count bump); branching into multiple candidate contexts never mutates a
/// sibling's bindings.
#[derive(Debug, Clone, Default)]
pub struct BindingContext(Rc<HashMap<Variable, Datum>>);

impl BindingContext {
    pub fn new() -> Self {
        Self(Rc::new(HashMap::new()))
    }

    pub fn get(&self, var: &Variable) -> Option<&Datum> {
        self.0.get(var)
    }

    /// Bind `var` to `datum`, returning a new context; `self` is
    /// unaffected. Panics if `var` is already bound to a different datum;
    /// the query engine's unification step must check equality itself and
    /// never call this for a conflicting rebind.
    fn bind(&self, var: Variable, datum: Datum) -> BindingContext {
        let mut map = (*self.0).clone();
        map.insert(var, datum);
        BindingContext(Rc::new(map))
    }

    /// Attempt to unify `slot` against `datum`: literal slots must equal
    /// `datum`; variable slots bind if unbound, else must equal the
    /// current binding. Returns `None` on conflict.
    fn unify_slot(&self, slot: &Slot, datum: &Datum) -> Option<BindingContext> {
        match slot {
            Slot::Literal(lit) => (lit == datum).then(|| self.clone()),
            Slot::Var(v) => match self.get(v) {
                Some(existing) => (existing == datum).then(|| self.clone()),
                None => Some(self.bind(v.clone(), datum.clone())),
            },
        }
    }
}

/// `asc` or `desc` ordering direction for one `orderBy` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// A post-match predicate over one bound (or fallback-substituted)
/// variable. The predicate decides how to treat a selector with neither a
/// binding nor a fallback; it receives `None` in that case.
pub struct Filter {
    pub selector: Variable,
    pub predicate: Box<dyn Fn(Option<&Datum>) -> bool>,
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

impl Filter {
    pub fn new(selector: Variable, predicate: impl Fn(Option<&Datum>) -> bool + 'static) -> Self {
        Self {
            selector,
            predicate: Box::new(predicate),
        }
    }
}

/// A query: projection, conjunctive/optional/negated patterns, filters,
/// ordering and limit.
#[derive(Debug, Default)]
pub struct Query {
    pub find: Vec<Variable>,
    pub where_: Vec<Pattern>,
    pub optional: Vec<Pattern>,
    pub where_not: Vec<Pattern>,
    pub filters: Vec<Filter>,
    pub order_by: Vec<(Variable, OrderDirection)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(find: Vec<Variable>) -> Self {
        Self {
            find,
            ..Default::default()
        }
    }
}

/// Anything that can hand the query engine candidate facts for a pattern,
/// given the slots already bound in a context. Implemented by the triple
/// store's index probe; the engine re-unifies every candidate strictly, so
/// a source may over-return (e.g. scan everything) without breaking
/// correctness, only performance.
pub trait PatternSource {
    fn candidates(&self, pattern: &Pattern) -> Vec<crate::triple::Fact>;
}

/// One projected row: `find.len()` optional datums, in `find` order.
pub type Row = Vec<Option<Datum>>;

/// Resolve `query` against `source`, returning the final binding contexts
/// (before projection) that satisfied `where`, `optional`, `whereNot` and
/// `filters`, in an unspecified but implementation-stable order.
pub fn resolve_contexts(source: &impl PatternSource, query: &Query) -> Vec<BindingContext> {
    // An empty `where` yields an empty result, not the trivial one-row
    // "Cartesian universe" a naive implementation would fall back to.
    if query.where_.is_empty() {
        return Vec::new();
    }

    let mut contexts = vec![BindingContext::new()];

    for pattern in &query.where_ {
        let mut next = Vec::new();
        for ctx in &contexts {
            for fact in source.candidates(pattern) {
                if let Some(extended) = unify_pattern(ctx, pattern, &fact) {
                    next.push(extended);
                }
            }
        }
        contexts = next;
        if contexts.is_empty() {
            return contexts;
        }
    }

    for pattern in &query.optional {
        let mut next = Vec::new();
        for ctx in &contexts {
            let mut extended_any = false;
            for fact in source.candidates(pattern) {
                if let Some(extended) = unify_pattern(ctx, pattern, &fact) {
                    next.push(extended);
                    extended_any = true;
                }
            }
            if !extended_any {
                next.push(ctx.clone());
            }
        }
        contexts = next;
    }

    if !query.where_not.is_empty() {
        contexts.retain(|ctx| {
            query
                .where_not
                .iter()
                .all(|pattern| !matches_any(source, pattern, ctx))
        });
    }

    for filter in &query.filters {
        contexts.retain(|ctx| (filter.predicate)(ctx.get(&filter.selector)));
    }

    contexts
}

fn unify_pattern(ctx: &BindingContext, pattern: &Pattern, fact: &crate::triple::Fact) -> Option<BindingContext> {
    let ctx = ctx.unify_slot(&pattern.entity, &Datum::Id(fact.entity))?;
    let ctx = ctx.unify_slot(&pattern.attribute, &Datum::Id(fact.attribute))?;
    ctx.unify_slot(&pattern.value, &Datum::Value(fact.value.clone()))
}

fn matches_any(source: &impl PatternSource, pattern: &Pattern, ctx: &BindingContext) -> bool {
    source
        .candidates(pattern)
        .iter()
        .any(|fact| unify_pattern(ctx, pattern, fact).is_some())
}

/// Project a context onto `find`, then sort by `order_by` (absent values
/// sort last regardless of direction) and truncate to `limit`.
pub fn project_and_sort(query: &Query, contexts: Vec<BindingContext>) -> Vec<Row> {
    let mut rows: Vec<Row> = contexts
        .iter()
        .map(|ctx| query.find.iter().map(|v| ctx.get(v).cloned()).collect())
        .collect();

    if !query.order_by.is_empty() {
        let key_indices: Vec<(usize, OrderDirection)> = query
            .order_by
            .iter()
            .filter_map(|(var, dir)| {
                query
                    .find
                    .iter()
                    .position(|f| f == var)
                    .map(|idx| (idx, *dir))
            })
            .collect();

        rows.sort_by(|a, b| {
            for (idx, dir) in &key_indices {
                let ord = compare_absent_last(&a[*idx], &b[*idx]);
                let ord = match dir {
                    OrderDirection::Asc => ord,
                    OrderDirection::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    if let Some(limit) = query.limit {
        rows.truncate(limit);
    }

    rows
}

fn compare_absent_last(a: &Option<Datum>, b: &Option<Datum>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
