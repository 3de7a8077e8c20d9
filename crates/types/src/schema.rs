//! Schema fragments and the sid-indexed table that holds them
//!
//! A [`Schema`] is a lossless projection of the JSON-Schema keywords an API
//! description may use. Nested schemas are either embedded directly or held
//! as a [`Pointer`] to a named entry of the [`SchemaTable`].

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of one entry in a [`SchemaTable`]. Always `>= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sid(pub u32);

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Boolean => "boolean",
            SchemaType::Integer => "integer",
            SchemaType::Number => "number",
            SchemaType::String => "string",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
        }
    }
}

/// A named reference together with the sid it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointer {
    #[serde(rename = "$ref")]
    pub reference: String,
    #[serde(rename = "$sid")]
    pub sid: Sid,
}

/// Where a nested schema would go: embedded in place, or pointing at a table entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaOrPtr {
    Ptr(Pointer),
    Schema(Box<Schema>),
}

impl SchemaOrPtr {
    pub fn as_pointer(&self) -> Option<&Pointer> {
        match self {
            SchemaOrPtr::Ptr(ptr) => Some(ptr),
            SchemaOrPtr::Schema(_) => None,
        }
    }
}

impl From<Schema> for SchemaOrPtr {
    fn from(schema: Schema) -> Self {
        SchemaOrPtr::Schema(Box::new(schema))
    }
}

impl From<Pointer> for SchemaOrPtr {
    fn from(ptr: Pointer) -> Self {
        SchemaOrPtr::Ptr(ptr)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<SchemaOrPtr>),
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Supported keywords only; anything else in the source is dropped on projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SchemaType>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Number>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub exclusive_minimum: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub exclusive_maximum: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<Number>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaOrPtr>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique_items: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaOrPtr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<SchemaOrPtr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<SchemaOrPtr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<SchemaOrPtr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<SchemaOrPtr>>,
}

impl Schema {
    pub fn of_type(kind: SchemaType) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    /// Direct children of this schema, in a stable order.
    pub fn children(&self) -> impl Iterator<Item = &SchemaOrPtr> {
        let additional = match &self.additional_properties {
            Some(AdditionalProperties::Schema(schema)) => Some(schema.as_ref()),
            _ => None,
        };
        self.items
            .as_deref()
            .into_iter()
            .chain(self.properties.values())
            .chain(additional)
            .chain(self.all_of.iter())
            .chain(self.any_of.iter())
            .chain(self.one_of.iter())
            .chain(self.not.as_deref())
    }

    /// Sids this schema refers to, at any depth of embedding.
    pub fn referenced_sids(&self) -> Vec<Sid> {
        let mut out = Vec::new();
        collect_sids(self, &mut out);
        out
    }
}

fn collect_sids(schema: &Schema, out: &mut Vec<Sid>) {
    for child in schema.children() {
        match child {
            SchemaOrPtr::Ptr(ptr) => out.push(ptr.sid),
            SchemaOrPtr::Schema(inner) => collect_sids(inner, out),
        }
    }
}

/// One slot of the table. `name` is the absolute reference a named schema was
/// registered under; anonymous schemas have none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub schema: SchemaOrPtr,
}

impl TableEntry {
    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    pub fn referenced_sids(&self) -> Vec<Sid> {
        match &self.schema {
            SchemaOrPtr::Ptr(ptr) => vec![ptr.sid],
            SchemaOrPtr::Schema(schema) => schema.referenced_sids(),
        }
    }
}

/// Sid-indexed store of schema fragments.
///
/// Read-only once built; allocation and deduplication live in the compiler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaTable {
    entries: BTreeMap<Sid, TableEntry>,
}

impl SchemaTable {
    pub fn from_entries(entries: BTreeMap<Sid, TableEntry>) -> Self {
        Self { entries }
    }

    pub fn get(&self, sid: Sid) -> Option<&TableEntry> {
        self.entries.get(&sid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Sid, &TableEntry)> {
        self.entries.iter().map(|(sid, entry)| (*sid, entry))
    }

    /// Sid of the named entry registered under `reference`.
    pub fn sid_of(&self, reference: &str) -> Option<Sid> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.name.as_deref() == Some(reference))
            .map(|(sid, _)| *sid)
    }

    /// `sid` plus every entry reachable from it through pointers, in
    /// discovery order. Unknown sids are skipped.
    pub fn closure(&self, sid: Sid) -> Vec<Sid> {
        let mut seen = Vec::new();
        let mut stack = vec![sid];
        while let Some(next) = stack.pop() {
            if seen.contains(&next) {
                continue;
            }
            let Some(entry) = self.entries.get(&next) else {
                continue;
            };
            seen.push(next);
            let mut children = entry.referenced_sids();
            children.reverse();
            stack.extend(children);
        }
        seen
    }

    /// Sids are dense and 1-based.
    pub fn is_dense(&self) -> bool {
        self.entries
            .keys()
            .enumerate()
            .all(|(index, sid)| sid.0 as usize == index + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ptr(reference: &str, sid: u32) -> SchemaOrPtr {
        Pointer {
            reference: reference.into(),
            sid: Sid(sid),
        }
        .into()
    }

    #[test]
    fn test_wire_form_distinguishes_pointers() {
        let mut object = Schema::of_type(SchemaType::Object);
        object.properties.insert("owner".into(), ptr("#/components/schemas/User", 1));
        object
            .properties
            .insert("name".into(), Schema::of_type(SchemaType::String).into());
        object.required = vec!["name".into()];

        let value = serde_json::to_value(&object).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "owner": {"$ref": "#/components/schemas/User", "$sid": 1}
                },
                "required": ["name"]
            })
        );

        let back: Schema = serde_json::from_value(value).unwrap();
        assert_eq!(back, object);
        assert!(back.properties["owner"].as_pointer().is_some());
    }

    #[test]
    fn test_one_keyword_breaks_equality() {
        let plain = Schema::of_type(SchemaType::String);
        let mut bounded = plain.clone();
        bounded.max_length = Some(8);
        assert_ne!(plain, bounded);
        assert_eq!(plain, Schema::of_type(SchemaType::String));
    }

    #[test]
    fn test_closure_follows_pointers() {
        let mut entries = BTreeMap::new();
        let mut list = Schema::of_type(SchemaType::Array);
        list.items = Some(Box::new(ptr("#/components/schemas/Pet", 2)));
        entries.insert(
            Sid(1),
            TableEntry {
                name: Some("#/components/schemas/Pets".into()),
                schema: list.into(),
            },
        );
        let mut pet = Schema::of_type(SchemaType::Object);
        pet.properties.insert("tag".into(), ptr("#/components/schemas/Tag", 3));
        entries.insert(
            Sid(2),
            TableEntry {
                name: Some("#/components/schemas/Pet".into()),
                schema: pet.into(),
            },
        );
        entries.insert(
            Sid(3),
            TableEntry {
                name: Some("#/components/schemas/Tag".into()),
                schema: Schema::of_type(SchemaType::String).into(),
            },
        );
        entries.insert(
            Sid(4),
            TableEntry {
                name: None,
                schema: Schema::of_type(SchemaType::Integer).into(),
            },
        );
        let table = SchemaTable::from_entries(entries);

        assert!(table.is_dense());
        assert_eq!(table.closure(Sid(1)), vec![Sid(1), Sid(2), Sid(3)]);
        assert_eq!(table.closure(Sid(4)), vec![Sid(4)]);
        assert!(table.closure(Sid(9)).is_empty());
        assert_eq!(table.sid_of("#/components/schemas/Tag"), Some(Sid(3)));
        assert_eq!(table.sid_of("#/components/schemas/Nope"), None);
    }
}
