//! Hybrid logical clock (C1): stamps every fact and gives a total order
//! across a distributed system while tracking wall-clock time.
//!
//! Ordering rules:
//! 1. Higher physical time wins.
//! 2. If physical time is equal, higher logical counter wins.
//! 3. If both are equal, higher node id wins.
//!
//! This ensures a total order across all facts from all nodes.

use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::id::NodeId;

/// A single HLC reading: `(physical_ms, logical, node_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hlc {
    pub physical_ms: u64,
    pub logical: u32,
    pub node_id: NodeId,
}

impl Ord for Hlc {
    fn cmp(&self, other: &Self) -> Ordering {
        self.physical_ms
            .cmp(&other.physical_ms)
            .then(self.logical.cmp(&other.logical))
            .then(self.node_id.cmp(&other.node_id))
    }
}

impl PartialOrd for Hlc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Generator for [`Hlc`] timestamps. Owned exclusively by a store (local
/// or network); mutated only by mutation paths, never read concurrently
/// with a write in the single-threaded cooperative model.
#[derive(Debug, Clone)]
pub struct HlcClock {
    node_id: NodeId,
    last_physical: u64,
    logical: u32,
}

impl HlcClock {
    /// A fresh clock with a node id drawn from a cryptographic RNG.
    pub fn new() -> Self {
        Self::with_node_id(NodeId::generate())
    }

    pub fn with_node_id(node_id: NodeId) -> Self {
        Self {
            node_id,
            last_physical: 0,
            logical: 0,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Produce the next timestamp for a local event.
    pub fn now(&mut self) -> Hlc {
        let wall = current_physical_ms();
        if wall > self.last_physical {
            self.last_physical = wall;
            self.logical = 0;
        } else {
            self.bump_logical();
        }
        self.reading()
    }

    /// Fold in a timestamp observed from a remote party, advancing this
    /// clock so the next `now()` strictly follows it.
    pub fn observe(&mut self, remote: Hlc) {
        let wall = current_physical_ms();
        let max_p = wall.max(self.last_physical).max(remote.physical_ms);

        if max_p == self.last_physical && max_p == remote.physical_ms {
            self.logical = self.logical.max(remote.logical);
            self.bump_logical();
        } else if max_p == self.last_physical {
            self.bump_logical();
        } else if max_p == remote.physical_ms {
            self.logical = remote.logical;
            self.bump_logical();
        } else {
            self.logical = 0;
        }
        self.last_physical = max_p;
    }

    /// Lexicographic comparison of two readings, as an associated function
    /// so callers don't need a clock instance to compare two timestamps
    /// they already hold.
    pub fn compare(a: Hlc, b: Hlc) -> Ordering {
        a.cmp(&b)
    }

    fn reading(&self) -> Hlc {
        Hlc {
            physical_ms: self.last_physical,
            logical: self.logical,
            node_id: self.node_id,
        }
    }

    /// Guard against counter overflow within one physical tick: advance
    /// `last_physical` by one unit and reset the counter instead of
    /// wrapping.
    fn bump_logical(&mut self) {
        if self.logical == u32::MAX {
            self.last_physical += 1;
            self.logical = 0;
        } else {
            self.logical += 1;
        }
    }
}

impl Default for HlcClock {
    fn default() -> Self {
        Self::new()
    }
}

fn current_physical_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_millis() as u64
}
