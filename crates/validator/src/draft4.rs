//! Schema table entries rendered as a JSON Schema draft-4 document
//!
//! OpenAPI 3.0 schemas are almost draft-4 already. The differences handled
//! here: `nullable` becomes a union with `null`, and pointers become local
//! `$ref`s into `definitions`, keyed by sid.

use crate::errors::{Result, ValidatorError};
use monkey_types::{AdditionalProperties, Schema, SchemaOrPtr, SchemaTable, Sid};
use serde_json::{json, Map, Value};

pub const DRAFT4_META: &str = "http://json-schema.org/draft-04/schema#";

pub fn definition_ref(sid: Sid) -> String {
    format!("#/definitions/{sid}")
}

/// A self-contained document validating against `sid`: the entry plus every
/// entry reachable from it.
pub fn document_for(table: &SchemaTable, sid: Sid) -> Result<Value> {
    if table.get(sid).is_none() {
        return Err(ValidatorError::NoSuchRef(sid.to_string()));
    }
    let mut definitions = Map::new();
    for reached in table.closure(sid) {
        if let Some(entry) = table.get(reached) {
            definitions.insert(reached.to_string(), emit(&entry.schema));
        }
    }
    Ok(json!({
        "$schema": DRAFT4_META,
        "$ref": definition_ref(sid),
        "definitions": definitions,
    }))
}

pub fn emit(schema: &SchemaOrPtr) -> Value {
    match schema {
        SchemaOrPtr::Ptr(ptr) => json!({ "$ref": definition_ref(ptr.sid) }),
        SchemaOrPtr::Schema(schema) => emit_schema(schema),
    }
}

fn emit_all(schemas: &[SchemaOrPtr]) -> Value {
    Value::Array(schemas.iter().map(emit).collect())
}

fn emit_schema(schema: &Schema) -> Value {
    let mut out = Map::new();
    let mut put = |key: &str, value: Value| {
        out.insert(key.to_string(), value);
    };

    if let Some(kind) = schema.kind {
        put("type", json!(kind.as_str()));
    }
    if let Some(values) = &schema.enumeration {
        put("enum", Value::Array(values.clone()));
    }
    if let Some(format) = &schema.format {
        put("format", json!(format));
    }
    if let Some(default) = &schema.default {
        put("default", default.clone());
    }

    if let Some(minimum) = &schema.minimum {
        put("minimum", Value::Number(minimum.clone()));
        if schema.exclusive_minimum {
            put("exclusiveMinimum", json!(true));
        }
    }
    if let Some(maximum) = &schema.maximum {
        put("maximum", Value::Number(maximum.clone()));
        if schema.exclusive_maximum {
            put("exclusiveMaximum", json!(true));
        }
    }
    if let Some(multiple_of) = &schema.multiple_of {
        put("multipleOf", Value::Number(multiple_of.clone()));
    }

    if let Some(min_length) = schema.min_length {
        put("minLength", json!(min_length));
    }
    if let Some(max_length) = schema.max_length {
        put("maxLength", json!(max_length));
    }
    if let Some(pattern) = &schema.pattern {
        put("pattern", json!(pattern));
    }

    if let Some(items) = &schema.items {
        put("items", emit(items));
    }
    if let Some(min_items) = schema.min_items {
        put("minItems", json!(min_items));
    }
    if let Some(max_items) = schema.max_items {
        put("maxItems", json!(max_items));
    }
    if schema.unique_items {
        put("uniqueItems", json!(true));
    }

    if !schema.properties.is_empty() {
        let properties: Map<String, Value> = schema
            .properties
            .iter()
            .map(|(name, inner)| (name.clone(), emit(inner)))
            .collect();
        put("properties", Value::Object(properties));
    }
    // Draft 4 rejects an empty `required` array.
    if !schema.required.is_empty() {
        put("required", json!(schema.required));
    }
    match &schema.additional_properties {
        Some(AdditionalProperties::Allowed(allowed)) => put("additionalProperties", json!(allowed)),
        Some(AdditionalProperties::Schema(inner)) => put("additionalProperties", emit(inner)),
        None => {}
    }
    if let Some(min_properties) = schema.min_properties {
        put("minProperties", json!(min_properties));
    }
    if let Some(max_properties) = schema.max_properties {
        put("maxProperties", json!(max_properties));
    }

    if !schema.all_of.is_empty() {
        put("allOf", emit_all(&schema.all_of));
    }
    if !schema.any_of.is_empty() {
        put("anyOf", emit_all(&schema.any_of));
    }
    if !schema.one_of.is_empty() {
        put("oneOf", emit_all(&schema.one_of));
    }
    if let Some(not) = &schema.not {
        put("not", emit(not));
    }

    if schema.nullable {
        return nullable(out, schema);
    }
    Value::Object(out)
}

/// Admit `null` in addition to whatever `out` accepts.
///
/// A plain typed or enumerated schema widens its own `type`/`enum`; anything
/// using combinators is wrapped, since `null` would fail their members.
fn nullable(mut out: Map<String, Value>, schema: &Schema) -> Value {
    let combined = !schema.all_of.is_empty()
        || !schema.any_of.is_empty()
        || !schema.one_of.is_empty()
        || schema.not.is_some();
    if combined {
        return json!({ "anyOf": [{ "type": "null" }, Value::Object(out)] });
    }

    if let Some(kind) = schema.kind {
        out.insert("type".into(), json!([kind.as_str(), "null"]));
    }
    if let Some(Value::Array(values)) = out.get_mut("enum") {
        if !values.contains(&Value::Null) {
            values.push(Value::Null);
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use monkey_types::{Pointer, SchemaType, TableEntry};
    use std::collections::BTreeMap;

    #[test]
    fn test_nullable_widens_type_and_enum() {
        let mut schema = Schema::of_type(SchemaType::String);
        schema.nullable = true;
        schema.enumeration = Some(vec![json!("a"), json!("b")]);
        assert_eq!(
            emit(&schema.into()),
            json!({"type": ["string", "null"], "enum": ["a", "b", null]})
        );
    }

    #[test]
    fn test_nullable_wraps_combinators() {
        let mut schema = Schema::default();
        schema.nullable = true;
        schema.one_of = vec![
            Schema::of_type(SchemaType::String).into(),
            Schema::of_type(SchemaType::Integer).into(),
        ];
        assert_eq!(
            emit(&schema.into()),
            json!({"anyOf": [
                {"type": "null"},
                {"oneOf": [{"type": "string"}, {"type": "integer"}]}
            ]})
        );
    }

    #[test]
    fn test_document_contains_only_the_closure() {
        let mut list = Schema::of_type(SchemaType::Array);
        list.items = Some(Box::new(
            Pointer {
                reference: "#/components/schemas/Pet".into(),
                sid: Sid(2),
            }
            .into(),
        ));
        let mut entries = BTreeMap::new();
        entries.insert(
            Sid(1),
            TableEntry {
                name: None,
                schema: list.into(),
            },
        );
        entries.insert(
            Sid(2),
            TableEntry {
                name: Some("#/components/schemas/Pet".into()),
                schema: Schema::of_type(SchemaType::Object).into(),
            },
        );
        entries.insert(
            Sid(3),
            TableEntry {
                name: None,
                schema: Schema::of_type(SchemaType::Boolean).into(),
            },
        );
        let table = SchemaTable::from_entries(entries);

        let document = document_for(&table, Sid(1)).unwrap();
        assert_eq!(document["$ref"], json!("#/definitions/1"));
        assert_eq!(
            document["definitions"],
            json!({
                "1": {"type": "array", "items": {"$ref": "#/definitions/2"}},
                "2": {"type": "object"}
            })
        );
        assert_eq!(
            document_for(&table, Sid(7)),
            Err(ValidatorError::NoSuchRef("7".into()))
        );
    }
}
