//! The fact (triple) type stored by the triple store.

use serde::{Deserialize, Serialize};

use crate::hlc::Hlc;
use crate::id::Id;
use crate::value::Value;

/// An atomic assertion `(entity, attribute, value)` stamped with an HLC.
/// The HLC is internal bookkeeping; public store APIs expose the
/// `(entity, attribute, value)` triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    pub entity: Id,
    pub attribute: Id,
    pub value: Value,
    pub hlc: Hlc,
}

impl Fact {
    pub fn new(entity: Id, attribute: Id, value: Value, hlc: Hlc) -> Self {
        Self {
            entity,
            attribute,
            value,
            hlc,
        }
    }
}
