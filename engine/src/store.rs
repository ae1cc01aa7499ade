//! Indexed fact storage (C4): last-writer-wins conflict resolution driven
//! by the HLC, three synchronized indexes, and the `Store` trait shared
//! with the network-backed store in `strand-client`.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::hlc::{Hlc, HlcClock};
use crate::id::Id;
use crate::query::{resolve_contexts, project_and_sort, Pattern, PatternSource, Query, Row, Slot};
use crate::triple::Fact;
use crate::value::Value;

/// The operations shared by the local [`TripleStore`] and any
/// network-backed store built on top of [`crate::query::Query`] (see
/// `strand_client::NetworkStore`). All methods are `async` to match the
/// network variant, even though the local implementation completes
/// immediately.
#[async_trait]
pub trait Store {
    /// Insert or conflict-resolve a batch of facts. Duplicate `(e, a, v)`
    /// facts collapse to one; a differing value for the same `(e, a)` is
    /// resolved by newer-HLC-wins.
    async fn add(&mut self, facts: Vec<Fact>) -> Result<()>;

    /// Remove every fact whose entity equals `entity` from the store.
    async fn delete_all_by_id(&mut self, entity: Id) -> Result<()>;

    /// Resolve `query` against the store's current facts.
    async fn query(&self, query: &Query) -> Result<Vec<Row>>;

    /// Generate a fresh entity id.
    fn generate_id(&self) -> Id;

    /// The next HLC reading for a local mutation. Owned by the store;
    /// never read concurrently with a write.
    fn next_timestamp(&mut self) -> Hlc;
}

/// The in-memory, append-like fact store. Facts live in a canonical
/// `(entity, attribute) -> Fact` map, a single source of truth in place of
/// three independently-maintained structures, with
/// `by_entity`/`by_attribute`/`by_value` kept as derived indexes for query
/// probes. Every mutating path updates the canonical map first and then
/// repairs the three indexes, so they can never drift from it.
#[derive(Debug)]
pub struct TripleStore {
    current: HashMap<(Id, Id), Fact>,
    by_entity: HashMap<Id, Vec<Fact>>,
    by_attribute: HashMap<Id, Vec<Fact>>,
    by_value: HashMap<Value, Vec<Fact>>,
    clock: HlcClock,
}

impl TripleStore {
    /// A fresh, empty store whose HLC uses the given node id.
    pub fn new(node_id: u32) -> Self {
        Self::with_clock(HlcClock::with_node_id(crate::id::NodeId(node_id)))
    }

    /// Construct with an already-built clock, e.g. to share a node id
    /// convention with a network store in the same process.
    pub fn with_clock(clock: HlcClock) -> Self {
        Self {
            current: HashMap::new(),
            by_entity: HashMap::new(),
            by_attribute: HashMap::new(),
            by_value: HashMap::new(),
            clock,
        }
    }

    /// Total number of live facts.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// All live facts, for tests and the query engine's full-scan fallback.
    pub fn all_facts(&self) -> Vec<Fact> {
        self.current.values().cloned().collect()
    }

    pub fn by_entity(&self) -> &HashMap<Id, Vec<Fact>> {
        &self.by_entity
    }

    pub fn by_attribute(&self) -> &HashMap<Id, Vec<Fact>> {
        &self.by_attribute
    }

    pub fn by_value(&self) -> &HashMap<Value, Vec<Fact>> {
        &self.by_value
    }

    fn insert_fact(&mut self, fact: Fact) {
        let key = (fact.entity, fact.attribute);
        match self.current.get(&key) {
            Some(existing) if existing.value == fact.value => {
                // Identical (e, a, v): dedup to the max-HLC copy.
                if fact.hlc > existing.hlc {
                    self.replace_indexed(key, fact);
                }
            }
            Some(existing) if fact.hlc > existing.hlc => {
                // Conflicting value for the same (e, a): newer HLC wins.
                self.replace_indexed(key, fact);
            }
            Some(_) => {
                // An older or equal-HLC write for an already-resolved
                // (e, a) pair loses; nothing changes.
            }
            None => self.insert_indexed(key, fact),
        }
    }

    fn insert_indexed(&mut self, key: (Id, Id), fact: Fact) {
        self.by_entity.entry(fact.entity).or_default().push(fact.clone());
        self.by_attribute.entry(fact.attribute).or_default().push(fact.clone());
        self.by_value.entry(fact.value.clone()).or_default().push(fact.clone());
        self.current.insert(key, fact);
    }

    fn replace_indexed(&mut self, key: (Id, Id), fact: Fact) {
        if let Some(old) = self.current.remove(&key) {
            Self::remove_from(&mut self.by_entity, old.entity, &old);
            Self::remove_from(&mut self.by_attribute, old.attribute, &old);
            Self::remove_from(&mut self.by_value, old.value.clone(), &old);
        }
        self.insert_indexed(key, fact);
    }

    fn remove_from<K: std::hash::Hash + Eq>(index: &mut HashMap<K, Vec<Fact>>, key: K, fact: &Fact) {
        if let Some(bucket) = index.get_mut(&key) {
            bucket.retain(|f| !(f.entity == fact.entity && f.attribute == fact.attribute));
            if bucket.is_empty() {
                index.remove(&key);
            }
        }
    }

    fn remove_entity(&mut self, entity: Id) {
        let removed: Vec<Fact> = self
            .current
            .iter()
            .filter(|(k, _)| k.0 == entity)
            .map(|(_, f)| f.clone())
            .collect();
        for fact in &removed {
            self.current.remove(&(fact.entity, fact.attribute));
        }
        self.by_entity.remove(&entity);
        for fact in &removed {
            Self::remove_from(&mut self.by_attribute, fact.attribute, fact);
            Self::remove_from(&mut self.by_value, fact.value.clone(), fact);
        }
    }
}

impl Default for TripleStore {
    fn default() -> Self {
        Self::new(crate::id::NodeId::generate().0)
    }
}

impl PatternSource for TripleStore {
    fn candidates(&self, pattern: &Pattern) -> Vec<Fact> {
        use crate::query::Datum;

        if let Slot::Literal(Datum::Id(entity)) = &pattern.entity {
            return self.by_entity.get(entity).cloned().unwrap_or_default();
        }
        if let Slot::Literal(Datum::Id(attr)) = &pattern.attribute {
            return self.by_attribute.get(attr).cloned().unwrap_or_default();
        }
        if let Slot::Literal(Datum::Value(v)) = &pattern.value {
            return self.by_value.get(v).cloned().unwrap_or_default();
        }
        self.all_facts()
    }
}

#[async_trait]
impl Store for TripleStore {
    async fn add(&mut self, facts: Vec<Fact>) -> Result<()> {
        for fact in facts {
            self.insert_fact(fact);
        }
        Ok(())
    }

    async fn delete_all_by_id(&mut self, entity: Id) -> Result<()> {
        self.remove_entity(entity);
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Row>> {
        let contexts = resolve_contexts(self, query);
        Ok(project_and_sort(query, contexts))
    }

    fn generate_id(&self) -> Id {
        Id::generate()
    }

    fn next_timestamp(&mut self) -> Hlc {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeId;
    use crate::query::{Datum, Variable};

    fn fact(entity: Id, attribute: Id, value: Value, hlc: Hlc) -> Fact {
        Fact::new(entity, attribute, value, hlc)
    }

    fn hlc(ms: u64) -> Hlc {
        Hlc {
            physical_ms: ms,
            logical: 0,
            node_id: NodeId(1),
        }
    }

    #[tokio::test]
    async fn lww_keeps_newer_value_regardless_of_insertion_order() {
        let e = Id::generate();
        let a = Id::generate();
        let old = fact(e, a, Value::String("old".into()), hlc(1));
        let new = fact(e, a, Value::String("new".into()), hlc(2));

        let mut forward = TripleStore::new(1);
        forward.add(vec![old.clone(), new.clone()]).await.unwrap();
        assert_eq!(forward.len(), 1);
        assert_eq!(forward.all_facts()[0].value, Value::String("new".into()));

        let mut reversed = TripleStore::new(1);
        reversed.add(vec![new, old]).await.unwrap();
        assert_eq!(reversed.len(), 1);
        assert_eq!(reversed.all_facts()[0].value, Value::String("new".into()));
    }

    #[tokio::test]
    async fn duplicate_e_a_v_collapses_to_max_hlc() {
        let e = Id::generate();
        let a = Id::generate();
        let v = Value::Boolean(true);
        let mut store = TripleStore::new(1);
        store
            .add(vec![fact(e, a, v.clone(), hlc(5)), fact(e, a, v, hlc(1))])
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.all_facts()[0].hlc, hlc(5));
    }

    #[tokio::test]
    async fn index_coherence() {
        let mut store = TripleStore::new(1);
        for _ in 0..25 {
            let f = fact(Id::generate(), Id::generate(), Value::Number(1.0), hlc(1));
            store.add(vec![f]).await.unwrap();
        }
        for f in store.all_facts() {
            assert!(store.by_entity[&f.entity].iter().any(|x| x.attribute == f.attribute));
            assert!(store.by_attribute[&f.attribute].iter().any(|x| x.entity == f.entity));
            assert!(store.by_value[&f.value].iter().any(|x| x.entity == f.entity));
        }
        let total_by_entity: usize = store.by_entity.values().map(|v| v.len()).sum();
        assert_eq!(total_by_entity, store.len());
    }

    #[tokio::test]
    async fn delete_all_by_id_removes_from_every_index() {
        let e = Id::generate();
        let other = Id::generate();
        let a1 = Id::generate();
        let a2 = Id::generate();
        let mut store = TripleStore::new(1);
        store
            .add(vec![
                fact(e, a1, Value::Number(1.0), hlc(1)),
                fact(e, a2, Value::Number(2.0), hlc(1)),
                fact(other, a1, Value::Number(3.0), hlc(1)),
            ])
            .await
            .unwrap();

        store.delete_all_by_id(e).await.unwrap();

        assert!(!store.by_entity.contains_key(&e));
        assert!(store.all_facts().iter().all(|f| f.entity != e));
        assert!(store.by_attribute[&a1].iter().all(|f| f.entity != e));
        assert!(!store.by_value.contains_key(&Value::Number(2.0)));
        // The other entity's fact on a1 survives.
        assert!(store.by_attribute.get(&a1).is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn empty_where_on_nonempty_store_is_empty() {
        let mut store = TripleStore::new(1);
        store
            .add(vec![fact(Id::generate(), Id::generate(), Value::Boolean(true), hlc(1))])
            .await
            .unwrap();

        let query = Query::new(vec![Variable::new("x")]);
        let rows = store.query(&query).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn query_round_trips_through_store() {
        let e = Id::generate();
        let a = Id::generate();
        let mut store = TripleStore::new(1);
        store
            .add(vec![fact(e, a, Value::String("alice".into()), hlc(1))])
            .await
            .unwrap();

        let mut query = Query::new(vec![Variable::new("e"), Variable::new("name")]);
        query.where_.push(Pattern::new(
            Slot::var("e"),
            Slot::from(a),
            Slot::var("name"),
        ));

        let rows = store.query(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], Some(Datum::Id(e)));
        assert_eq!(rows[0][1], Some(Datum::Value(Value::String("alice".into()))));
    }

    #[tokio::test]
    async fn generate_id_is_random() {
        let store = TripleStore::new(1);
        assert_ne!(store.generate_id(), store.generate_id());
    }
}
