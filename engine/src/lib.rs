//! # Strand Engine
//!
//! The local half of a relational sync engine: a strongly-typed entity
//! database whose data is stored as a log of HLC-timestamped attribute
//! facts, queried through a datalog-style pattern engine.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine has no knowledge of files, sockets, or platform.
//! - **Deterministic**: the same facts and the same query always produce
//!   the same rows (barring `orderBy`-free ordering, which is explicitly
//!   unspecified).
//! - **Testable**: pure logic, no mocks needed.
//!
//! ## Core Concepts
//!
//! ### Facts
//!
//! Data is stored as [`Fact`](triple::Fact) triples: `(entity, attribute,
//! value, hlc)`. There is no row/column schema at the storage layer;
//! structure is imposed only by the [`Schema`] and the [`Database`] façade
//! built on top of it.
//!
//! ### Hybrid Logical Clock
//!
//! The [`Hlc`] stamps every fact and gives a total order across a
//! distributed system while tracking wall-clock time. Conflicting writes
//! to the same `(entity, attribute)` are resolved last-writer-wins by HLC
//! comparison, never by insertion order.
//!
//! ### Query engine
//!
//! [`Query`] resolution walks a [`BindingContext`](query::BindingContext)
//! through conjunctive `where` patterns, optional patterns, negation, post-
//! filters, ordering and limit. See [`query`] for the resolution algorithm.
//!
//! ### Database façade
//!
//! [`Database`] desugars schema-aware `create`/`query`/`delete` calls into
//! triples and queries against any [`Store`] implementation: the local
//! [`TripleStore`](store::TripleStore) here, or a network-backed store
//! elsewhere in the workspace.
//!
//! ## Quick Start
//!
//! ```rust
//! use strand_engine::{Schema, EntitySchema, FieldDef, FieldKind, Store, TripleStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> strand_engine::Result<()> {
//! let mut schema = Schema::new();
//! schema.add_entity(EntitySchema::new(
//!     "users",
//!     vec![
//!         FieldDef::new("name", FieldKind::String).with_fallback(""),
//!         FieldDef::new("age", FieldKind::Number).optional(),
//!     ],
//! ))?;
//!
//! let mut store = TripleStore::new(1);
//! let id = store.generate_id();
//! # let _ = id;
//! # Ok(())
//! # }
//! ```
//!
//! ## Persistence
//!
//! None. The store is ephemeral; persistence, if any, is the application's
//! responsibility or the remote server's.

pub mod database;
pub mod error;
pub mod hlc;
pub mod id;
pub mod query;
pub mod schema;
pub mod store;
pub mod triple;
pub mod value;

pub use database::{Database, EntityQuery, EntityRecord, FieldFilter, FilterOp};
pub use error::{Error, ErrorKind, Result};
pub use hlc::{Hlc, HlcClock};
pub use id::{Id, NodeId};
pub use query::{BindingContext, Datum, Filter, OrderDirection, Pattern, Query, Row, Slot, Variable};
pub use schema::{EntityScope, EntitySchema, FieldDef, FieldKind, Schema};
pub use store::{Store, TripleStore};
pub use triple::Fact;
pub use value::Value;
