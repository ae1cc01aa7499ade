//! On-wire message shapes. The byte encoding is left to the transport, so
//! this is one reasonable JSON framing, not a fixed protocol. Requests
//! carry a monotonically increasing `requestId` for correlation; facts
//! are rendered with hex-string identifiers since `Id`/`Value` already
//! serialize that way.

use serde::{Deserialize, Serialize};

use strand_engine::{Datum, Hlc, Id, OrderDirection, Pattern, Query, Row, Slot, Value};

/// A fact as sent over the wire. Unlike [`strand_engine::Fact`], the
/// value is optional: an absent value marks a tombstone, a representation
/// the wire needs but the in-memory `Fact` type, which always carries a
/// live value, does not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFact {
    pub entity: String,
    pub attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub hlc: Hlc,
}

impl WireFact {
    pub fn from_fact(fact: &strand_engine::Fact) -> Self {
        Self {
            entity: fact.entity.to_hex(),
            attribute: fact.attribute.to_hex(),
            value: Some(fact.value.clone()),
            hlc: fact.hlc,
        }
    }

    pub fn tombstone(entity: Id, attribute: Id, hlc: Hlc) -> Self {
        Self {
            entity: entity.to_hex(),
            attribute: attribute.to_hex(),
            value: None,
            hlc,
        }
    }
}

/// A bound datum as sent over the wire: an identifier or a value,
/// rendered with an explicit discriminant since JSON has no native way
/// to tell a 32-hex-char id apart from a string value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WireDatum {
    Id(String),
    Value(Value),
}

impl WireDatum {
    fn to_datum(&self) -> strand_engine::Result<Datum> {
        match self {
            WireDatum::Id(hex) => Ok(Datum::Id(Id::from_hex(hex)?)),
            WireDatum::Value(v) => Ok(Datum::Value(v.clone())),
        }
    }
}

/// A pattern slot as sent over the wire: a literal datum or a named
/// variable (variables carry no type, only a name, matching
/// [`strand_engine::Variable`]'s nominal equality).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WireSlot {
    Literal(WireDatum),
    Var(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePattern {
    pub entity: WireSlot,
    pub attribute: WireSlot,
    pub value: WireSlot,
}

pub fn pattern_to_wire(pattern: &Pattern) -> WirePattern {
    WirePattern {
        entity: slot_to_wire(&pattern.entity),
        attribute: slot_to_wire(&pattern.attribute),
        value: slot_to_wire(&pattern.value),
    }
}

fn slot_to_wire(slot: &Slot) -> WireSlot {
    match slot {
        Slot::Literal(Datum::Id(id)) => WireSlot::Literal(WireDatum::Id(id.to_hex())),
        Slot::Literal(Datum::Value(v)) => WireSlot::Literal(WireDatum::Value(v.clone())),
        Slot::Var(v) => WireSlot::Var(v.0.clone()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireOrderDirection {
    Asc,
    Desc,
}

impl From<OrderDirection> for WireOrderDirection {
    fn from(dir: OrderDirection) -> Self {
        match dir {
            OrderDirection::Asc => WireOrderDirection::Asc,
            OrderDirection::Desc => WireOrderDirection::Desc,
        }
    }
}

/// A query as sent over the wire. `filters` (predicate closures) have no
/// wire representation at all; [`crate::store::NetworkStore::query`]
/// rejects any query carrying them with `NotImplemented` before this
/// type is ever built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireQuery {
    pub find: Vec<String>,
    #[serde(rename = "where", default)]
    pub where_: Vec<WirePattern>,
    #[serde(default)]
    pub optional: Vec<WirePattern>,
    #[serde(rename = "whereNot", default)]
    pub where_not: Vec<WirePattern>,
    #[serde(rename = "orderBy", default)]
    pub order_by: Vec<(String, WireOrderDirection)>,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub fn query_to_wire(query: &Query) -> WireQuery {
    WireQuery {
        find: query.find.iter().map(|v| v.0.clone()).collect(),
        where_: query.where_.iter().map(pattern_to_wire).collect(),
        optional: query.optional.iter().map(pattern_to_wire).collect(),
        where_not: query.where_not.iter().map(pattern_to_wire).collect(),
        order_by: query
            .order_by
            .iter()
            .map(|(v, dir)| (v.0.clone(), (*dir).into()))
            .collect(),
        limit: query.limit,
    }
}

/// One row of a query result, in `find` order; a `None` entry is a
/// column the server marked `isUndefined`.
pub fn wire_row_to_row(row: Vec<Option<WireDatum>>) -> strand_engine::Result<Row> {
    row.into_iter()
        .map(|cell| cell.map(|d| d.to_datum()).transpose())
        .collect()
}

/// Messages sent from client to server. Every variant but `Ping` carries
/// a `requestId` the matching [`ServerMessage`] echoes back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Connect {
        request_id: u64,
        api_key: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        bearer_token: Option<String>,
    },
    TripleUpdate {
        request_id: u64,
        write_id: String,
        facts: Vec<WireFact>,
    },
    Query {
        request_id: u64,
        query: WireQuery,
    },
    Subscribe {
        request_id: u64,
        subscription_id: String,
    },
    Unsubscribe {
        request_id: u64,
        subscription_id: String,
    },
    Ping {
        request_id: u64,
    },
}

impl ClientMessage {
    pub fn request_id(&self) -> u64 {
        match self {
            ClientMessage::Connect { request_id, .. }
            | ClientMessage::TripleUpdate { request_id, .. }
            | ClientMessage::Query { request_id, .. }
            | ClientMessage::Subscribe { request_id, .. }
            | ClientMessage::Unsubscribe { request_id, .. }
            | ClientMessage::Ping { request_id } => *request_id,
        }
    }
}

/// Messages sent from server to client. A non-zero `status` rejects the
/// matching pending request with `message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    ConnectAck {
        request_id: u64,
        status: i32,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    TripleUpdateAck {
        request_id: u64,
        status: i32,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    QueryResult {
        request_id: u64,
        status: i32,
        #[serde(default)]
        rows: Vec<Vec<Option<WireDatum>>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    SubscriptionEvent {
        subscription_id: String,
        payload: serde_json::Value,
    },
    Pong {
        request_id: u64,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        status: i32,
        message: String,
    },
}

impl ServerMessage {
    /// The correlating `requestId`, if this frame answers a specific
    /// request rather than pushing an unsolicited subscription event.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            ServerMessage::ConnectAck { request_id, .. }
            | ServerMessage::TripleUpdateAck { request_id, .. }
            | ServerMessage::QueryResult { request_id, .. }
            | ServerMessage::Pong { request_id } => Some(*request_id),
            ServerMessage::Error { request_id, .. } => *request_id,
            ServerMessage::SubscriptionEvent { .. } => None,
        }
    }

    /// `Ok(())` if `status == 0`, else `Err` carrying the attached
    /// message (or a generic one) as a `Remote` error.
    pub fn into_result(self) -> strand_engine::Result<Self> {
        let (status, message) = match &self {
            ServerMessage::ConnectAck { status, message, .. }
            | ServerMessage::TripleUpdateAck { status, message, .. }
            | ServerMessage::QueryResult { status, message, .. } => {
                (*status, message.clone())
            }
            ServerMessage::Error { status, message, .. } => (*status, Some(message.clone())),
            ServerMessage::Pong { .. } | ServerMessage::SubscriptionEvent { .. } => (0, None),
        };
        if status == 0 {
            Ok(self)
        } else {
            Err(strand_engine::Error::Remote {
                code: status,
                message: message.unwrap_or_else(|| "request rejected".to_string()),
            })
        }
    }
}
