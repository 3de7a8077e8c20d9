use crate::endpoint::Endpoint;
use crate::schema::{SchemaTable, Sid};
use serde::{Deserialize, Serialize};

/// Compiled form of an API description: ordered endpoints plus the table
/// their sids index into. Immutable once produced by the compiler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecIR {
    pub endpoints: Vec<Endpoint>,
    pub schemas: SchemaTable,
}

impl SpecIR {
    /// Every sid referenced by an endpoint input, path partial or output.
    pub fn endpoint_sids(&self) -> Vec<Sid> {
        let mut sids: Vec<Sid> = self
            .endpoints
            .iter()
            .flat_map(|ep| {
                ep.inputs
                    .iter()
                    .map(|param| param.sid)
                    .chain(ep.outputs.values().copied())
            })
            .collect();
        sids.sort();
        sids.dedup();
        sids
    }

    /// True when every sid reachable from an endpoint exists in the table.
    pub fn is_closed(&self) -> bool {
        self.endpoint_sids().into_iter().all(|sid| {
            self.schemas.get(sid).is_some()
                && self.schemas.closure(sid).into_iter().all(|reached| {
                    self.schemas.get(reached).is_some_and(|entry| {
                        entry
                            .referenced_sids()
                            .into_iter()
                            .all(|child| self.schemas.get(child).is_some())
                    })
                })
        })
    }
}
