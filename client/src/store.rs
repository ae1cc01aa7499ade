//! Network-backed store: the same [`strand_engine::Store`] interface as
//! the local triple store, implemented by round-tripping requests
//! through a [`Connection`]. Grounded in `engine/src/store.rs`'s
//! "owning struct + async API" shape, generalized to a transport instead
//! of in-memory indexes.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use strand_engine::{Error, Fact, Hlc, HlcClock, Id, Query, Result, Row, Store};

use crate::connection::{Connection, ConnectionState};
use crate::protocol::{query_to_wire, wire_row_to_row, ClientMessage, ServerMessage, WireFact};

/// A [`Store`] backed by a [`Connection`] rather than in-memory indexes.
/// Construction asserts the connection is already `CONNECTED`. A caller
/// that wants retry-until-connected semantics should call
/// `connection.connect()` first and handle that failure there.
pub struct NetworkStore {
    connection: Connection,
    clock: HlcClock,
    pending_writes: Mutex<HashMap<String, Vec<Fact>>>,
}

impl NetworkStore {
    pub fn new(connection: Connection) -> Result<Self> {
        if connection.state() != ConnectionState::Connected {
            return Err(Error::connection(
                "network store requires an already-connected connection",
            ));
        }
        Ok(Self {
            connection,
            clock: HlcClock::new(),
            pending_writes: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_clock(connection: Connection, clock: HlcClock) -> Result<Self> {
        if connection.state() != ConnectionState::Connected {
            return Err(Error::connection(
                "network store requires an already-connected connection",
            ));
        }
        Ok(Self {
            connection,
            clock,
            pending_writes: Mutex::new(HashMap::new()),
        })
    }

    /// Writes sent but not yet acknowledged by the server.
    pub async fn pending_write_count(&self) -> usize {
        self.pending_writes.lock().await.len()
    }

    async fn run_query(&self, wire_query: crate::protocol::WireQuery) -> Result<Vec<Row>> {
        let response = self
            .connection
            .request(|request_id| ClientMessage::Query {
                request_id,
                query: wire_query,
            })
            .await?;
        match response {
            ServerMessage::QueryResult { rows, .. } => {
                rows.into_iter().map(wire_row_to_row).collect()
            }
            other => Err(Error::protocol(format!(
                "unexpected response to query: {other:?}"
            ))),
        }
    }
}

#[async_trait]
impl Store for NetworkStore {
    /// Facts arrive already HLC-stamped by the caller (the façade's
    /// `create`, or a direct `add`); this just records them under a
    /// fresh write id and round-trips them to the server.
    async fn add(&mut self, facts: Vec<Fact>) -> Result<()> {
        if facts.is_empty() {
            return Ok(());
        }
        let write_id = Id::generate().to_hex();
        self.pending_writes
            .lock()
            .await
            .insert(write_id.clone(), facts.clone());

        let wire_facts: Vec<WireFact> = facts.iter().map(WireFact::from_fact).collect();
        let result = self
            .connection
            .request({
                let write_id = write_id.clone();
                move |request_id| ClientMessage::TripleUpdate {
                    request_id,
                    write_id,
                    facts: wire_facts,
                }
            })
            .await;

        self.pending_writes.lock().await.remove(&write_id);

        match result? {
            ServerMessage::TripleUpdateAck { .. } => Ok(()),
            other => Err(Error::protocol(format!(
                "unexpected response to triple update: {other:?}"
            ))),
        }
    }

    /// Queries the server for every fact on `entity`, then sends one
    /// tombstone per `(entity, attribute)` stamped with a fresh HLC. The
    /// server, not this store, owns turning a tombstone into an actual
    /// deletion of its copy.
    async fn delete_all_by_id(&mut self, entity: Id) -> Result<()> {
        let attr_var = "a".to_string();
        let val_var = "v".to_string();
        let wire_query = crate::protocol::WireQuery {
            find: vec![attr_var.clone()],
            where_: vec![crate::protocol::WirePattern {
                entity: crate::protocol::WireSlot::Literal(crate::protocol::WireDatum::Id(
                    entity.to_hex(),
                )),
                attribute: crate::protocol::WireSlot::Var(attr_var),
                value: crate::protocol::WireSlot::Var(val_var),
            }],
            ..Default::default()
        };

        let rows = self.run_query(wire_query).await?;
        if rows.is_empty() {
            return Ok(());
        }

        let hlc = self.clock.now();
        let mut tombstones = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(Some(strand_engine::Datum::Id(attribute))) = row.into_iter().next() {
                tombstones.push(WireFact::tombstone(entity, attribute, hlc));
            }
        }
        if tombstones.is_empty() {
            return Ok(());
        }

        let write_id = Id::generate().to_hex();
        let response = self
            .connection
            .request(move |request_id| ClientMessage::TripleUpdate {
                request_id,
                write_id,
                facts: tombstones,
            })
            .await?;

        match response {
            ServerMessage::TripleUpdateAck { .. } => Ok(()),
            other => Err(Error::protocol(format!(
                "unexpected response to tombstone update: {other:?}"
            ))),
        }
    }

    /// Rejects any query carrying post-match `filters`: those are
    /// arbitrary Rust closures with no wire representation, so this
    /// backend implements only the patterns/ordering/limit subset of
    /// what a query can express, leaving predicate filters to backends
    /// that can evaluate them locally.
    async fn query(&self, query: &Query) -> Result<Vec<Row>> {
        if !query.filters.is_empty() {
            return Err(Error::not_implemented(
                "the network store does not support predicate filters",
            ));
        }
        self.run_query(query_to_wire(query)).await
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
    use crate::config::ConnectionConfig;

    #[tokio::test]
    async fn construction_requires_connected_state() {
        let config = ConnectionConfig::new("ws://localhost:1", "key").unwrap();
        let connection = Connection::new(config);
        let err = NetworkStore::new(connection).unwrap_err();
        assert_eq!(err.kind(), strand_engine::ErrorKind::Connection);
    }
}
