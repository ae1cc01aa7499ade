//! Tagged primitive value type (C2) carried by every fact.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::Id;

/// A primitive value stored in a fact. Nullability is represented by the
/// absence of a fact, never by a null variant here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Value {
    String(String),
    Number(f64),
    Boolean(bool),
    /// A reference to another entity, carried as its identifier.
    Ref(Id),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Ref(_) => "ref",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_ref_id(&self) -> Option<Id> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Encode into a tagged byte form; fails for values outside
    /// `{string, number, boolean}` at the wire boundary, where `ref` is
    /// transmitted as its identifier's hex string rather than as a
    /// distinct tag.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Value::String(s) => {
                let mut out = vec![TAG_STRING];
                out.extend_from_slice(s.as_bytes());
                Ok(out)
            }
            Value::Number(n) => {
                let mut out = vec![TAG_NUMBER];
                out.extend_from_slice(&n.to_be_bytes());
                Ok(out)
            }
            Value::Boolean(b) => Ok(vec![TAG_BOOLEAN, *b as u8]),
            Value::Ref(_) => Err(Error::UnsupportedValue(
                "ref values encode via their identifier, not valueEncode".into(),
            )),
        }
    }
}

const TAG_STRING: u8 = 0;
const TAG_NUMBER: u8 = 1;
const TAG_BOOLEAN: u8 = 2;

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Ref(id) => write!(f, "{id}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Number(n) => n.to_bits().hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::Ref(id) => id.hash(state),
        }
    }
}

/// Ordering used for `orderBy`: values of the same kind compare naturally;
/// values of different kinds compare by `type_name`, which is stable but
/// otherwise arbitrary; queries are expected to order a single-kind field.
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Ref(a), Value::Ref(b)) => a.cmp(b),
            _ => self.type_name().cmp(other.type_name()),
        }
    }
}
