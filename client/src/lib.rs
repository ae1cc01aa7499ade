//! # Strand Client
//!
//! The network half of the sync engine: a [`Store`](strand_engine::Store)
//! implementation that round-trips `strand-engine` facts and queries
//! through a WebSocket connection, plus the connection state machine and
//! wire framing underneath it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use strand_client::{Connection, ConnectionConfig, NetworkStore};
//!
//! # #[tokio::main]
//! # async fn main() -> strand_engine::Result<()> {
//! let config = ConnectionConfig::new("wss://sync.example.com", "api-key")?;
//! let connection = Connection::new(config);
//! connection.connect().await?;
//! let store = NetworkStore::new(connection)?;
//! # let _ = store;
//! # Ok(())
//! # }
//! ```
//!
//! This crate carries no schema awareness of its own; it implements the
//! same `Store` trait the local, in-memory `strand-engine` crate does, so
//! [`strand_engine::Database`] works unmodified against either backend.

pub mod config;
pub mod connection;
pub mod protocol;
pub mod store;

pub use config::ConnectionConfig;
pub use connection::{Connection, ConnectionState};
pub use protocol::{ClientMessage, ServerMessage, WireFact, WireQuery};
pub use store::NetworkStore;
