//! Sid allocation for the schema table under construction

use monkey_types::{Schema, SchemaOrPtr, SchemaTable, Sid, TableEntry};
use std::collections::BTreeMap;

/// Allocates sids in discovery order and deduplicates anonymous schemas.
///
/// Named schemas are reserved before their content is known, so a forward
/// reference can point at a sid whose entry is filled in later.
#[derive(Debug, Default)]
pub struct TableBuilder {
    entries: BTreeMap<Sid, TableEntry>,
    named: BTreeMap<String, Sid>,
    next: u32,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, entry: TableEntry) -> Sid {
        self.next += 1;
        let sid = Sid(self.next);
        self.entries.insert(sid, entry);
        sid
    }

    /// Sid for `reference`, allocating it on first registration. Later calls
    /// return the same sid.
    pub fn reserve_named(&mut self, reference: &str) -> Sid {
        if let Some(sid) = self.named.get(reference) {
            return *sid;
        }
        let sid = self.allocate(TableEntry {
            name: Some(reference.to_string()),
            schema: Schema::default().into(),
        });
        self.named.insert(reference.to_string(), sid);
        sid
    }

    pub fn named(&self, reference: &str) -> Option<Sid> {
        self.named.get(reference).copied()
    }

    /// Replace the content of a reserved named entry.
    pub fn fill(&mut self, sid: Sid, schema: SchemaOrPtr) {
        if let Some(entry) = self.entries.get_mut(&sid) {
            entry.schema = schema;
        }
    }

    /// Sid for a schema found inline. A bare pointer resolves to the sid it
    /// points at; anything else shares the sid of a structurally equal
    /// anonymous entry, or gets a fresh one.
    pub fn intern(&mut self, schema: SchemaOrPtr) -> Sid {
        if let SchemaOrPtr::Ptr(ptr) = &schema {
            return ptr.sid;
        }
        let existing = self
            .entries
            .iter()
            .find(|(_, entry)| !entry.is_named() && entry.schema == schema)
            .map(|(sid, _)| *sid);
        match existing {
            Some(sid) => sid,
            None => self.allocate(TableEntry { name: None, schema }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> SchemaTable {
        SchemaTable::from_entries(self.entries)
    }
}
