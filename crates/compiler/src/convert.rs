//! Projection of document schema objects onto the supported keyword set

use crate::errors::{CompileError, Result};
use crate::openapi::{AdditionalPropertiesObject, RefOr, SchemaObject, SCHEMA_REF_PREFIX};
use crate::table::TableBuilder;
use monkey_types::{AdditionalProperties, Pointer, Schema, SchemaOrPtr, SchemaType};
use std::collections::BTreeMap;
use tracing::warn;

fn schema_type(name: &str) -> Option<SchemaType> {
    match name {
        "boolean" => Some(SchemaType::Boolean),
        "integer" => Some(SchemaType::Integer),
        "number" => Some(SchemaType::Number),
        "string" => Some(SchemaType::String),
        "array" => Some(SchemaType::Array),
        "object" => Some(SchemaType::Object),
        _ => None,
    }
}

/// Resolve a `$ref` to the named sid it was reserved under.
pub(crate) fn pointer(table: &TableBuilder, reference: &str) -> Result<Pointer> {
    if !reference.starts_with(SCHEMA_REF_PREFIX) {
        return Err(CompileError::UnresolvedRef(reference.to_string()));
    }
    let sid = table
        .named(reference)
        .ok_or_else(|| CompileError::UnresolvedRef(reference.to_string()))?;
    Ok(Pointer {
        reference: reference.to_string(),
        sid,
    })
}

pub(crate) fn convert(table: &TableBuilder, source: &RefOr<SchemaObject>) -> Result<SchemaOrPtr> {
    match source {
        RefOr::Ref(reference) => Ok(pointer(table, &reference.reference)?.into()),
        RefOr::Item(object) => Ok(convert_object(table, object)?.into()),
    }
}

fn convert_boxed(
    table: &TableBuilder,
    source: &Option<Box<RefOr<SchemaObject>>>,
) -> Result<Option<Box<SchemaOrPtr>>> {
    source
        .as_deref()
        .map(|inner| convert(table, inner).map(Box::new))
        .transpose()
}

fn convert_all(table: &TableBuilder, sources: &[RefOr<SchemaObject>]) -> Result<Vec<SchemaOrPtr>> {
    sources.iter().map(|inner| convert(table, inner)).collect()
}

pub(crate) fn convert_object(table: &TableBuilder, object: &SchemaObject) -> Result<Schema> {
    let kind = match object.kind.as_deref() {
        None => None,
        Some(name) => {
            let kind = schema_type(name);
            if kind.is_none() {
                warn!(kind = name, "dropping unsupported schema type");
            }
            kind
        }
    };

    let properties: BTreeMap<String, SchemaOrPtr> = object
        .properties
        .iter()
        .map(|(name, inner)| Ok((name.clone(), convert(table, inner)?)))
        .collect::<Result<_>>()?;

    let additional_properties = match &object.additional_properties {
        None => None,
        Some(AdditionalPropertiesObject::Allowed(allowed)) => {
            Some(AdditionalProperties::Allowed(*allowed))
        }
        Some(AdditionalPropertiesObject::Schema(inner)) => Some(AdditionalProperties::Schema(
            Box::new(convert(table, inner)?),
        )),
    };

    Ok(Schema {
        kind,
        enumeration: object.enumeration.clone(),
        nullable: object.nullable,
        format: object.format.clone(),
        default: object.default.clone(),
        minimum: object.minimum.clone(),
        maximum: object.maximum.clone(),
        exclusive_minimum: object.exclusive_minimum,
        exclusive_maximum: object.exclusive_maximum,
        multiple_of: object.multiple_of.clone(),
        min_length: object.min_length,
        max_length: object.max_length,
        pattern: object.pattern.clone(),
        items: convert_boxed(table, &object.items)?,
        min_items: object.min_items,
        max_items: object.max_items,
        unique_items: object.unique_items,
        properties,
        required: object.required.clone(),
        additional_properties,
        min_properties: object.min_properties,
        max_properties: object.max_properties,
        all_of: convert_all(table, &object.all_of)?,
        any_of: convert_all(table, &object.any_of)?,
        one_of: convert_all(table, &object.one_of)?,
        not: convert_boxed(table, &object.not)?,
    })
}

/// Inverse projection, used when rebuilding a document from the IR.
pub(crate) fn to_object(schema: &Schema) -> SchemaObject {
    let additional_properties = schema.additional_properties.as_ref().map(|extra| match extra {
        AdditionalProperties::Allowed(allowed) => AdditionalPropertiesObject::Allowed(*allowed),
        AdditionalProperties::Schema(inner) => {
            AdditionalPropertiesObject::Schema(Box::new(to_ref_or(inner)))
        }
    });

    SchemaObject {
        kind: schema.kind.map(|kind| kind.as_str().to_string()),
        enumeration: schema.enumeration.clone(),
        nullable: schema.nullable,
        format: schema.format.clone(),
        default: schema.default.clone(),
        minimum: schema.minimum.clone(),
        maximum: schema.maximum.clone(),
        exclusive_minimum: schema.exclusive_minimum,
        exclusive_maximum: schema.exclusive_maximum,
        multiple_of: schema.multiple_of.clone(),
        min_length: schema.min_length,
        max_length: schema.max_length,
        pattern: schema.pattern.clone(),
        items: schema.items.as_deref().map(|inner| Box::new(to_ref_or(inner))),
        min_items: schema.min_items,
        max_items: schema.max_items,
        unique_items: schema.unique_items,
        properties: schema
            .properties
            .iter()
            .map(|(name, inner)| (name.clone(), to_ref_or(inner)))
            .collect(),
        required: schema.required.clone(),
        additional_properties,
        min_properties: schema.min_properties,
        max_properties: schema.max_properties,
        all_of: schema.all_of.iter().map(to_ref_or).collect(),
        any_of: schema.any_of.iter().map(to_ref_or).collect(),
        one_of: schema.one_of.iter().map(to_ref_or).collect(),
        not: schema.not.as_deref().map(|inner| Box::new(to_ref_or(inner))),
    }
}

pub(crate) fn to_ref_or(schema: &SchemaOrPtr) -> RefOr<SchemaObject> {
    match schema {
        SchemaOrPtr::Ptr(ptr) => RefOr::reference(ptr.reference.clone()),
        SchemaOrPtr::Schema(inner) => RefOr::Item(to_object(inner)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: serde_json::Value) -> SchemaObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_keywords_survive_projection() {
        let mut table = TableBuilder::new();
        let tag = table.reserve_named("#/components/schemas/Tag");
        let source = object(json!({
            "type": "object",
            "description": "dropped",
            "required": ["id"],
            "additionalProperties": false,
            "properties": {
                "id": {"type": "integer", "minimum": 1, "exclusiveMinimum": true},
                "status": {"type": "string", "enum": ["available", "sold"], "nullable": true},
                "tags": {"type": "array", "items": {"$ref": "#/components/schemas/Tag"}, "uniqueItems": true}
            }
        }));

        let schema = convert_object(&table, &source).unwrap();
        assert_eq!(schema.kind, Some(SchemaType::Object));
        assert_eq!(schema.required, vec!["id".to_string()]);
        assert_eq!(
            schema.additional_properties,
            Some(AdditionalProperties::Allowed(false))
        );

        let SchemaOrPtr::Schema(tags) = &schema.properties["tags"] else {
            panic!("tags should be embedded");
        };
        assert!(tags.unique_items);
        assert_eq!(
            tags.items.as_deref().and_then(SchemaOrPtr::as_pointer).map(|p| p.sid),
            Some(tag)
        );

        let back = serde_json::to_value(to_object(&schema)).unwrap();
        assert_eq!(back["properties"]["id"], json!({"type": "integer", "minimum": 1, "exclusiveMinimum": true}));
        assert_eq!(back["properties"]["status"]["nullable"], json!(true));
        assert!(back.get("description").is_none());
    }

    #[test]
    fn test_unknown_ref_is_unresolved() {
        let table = TableBuilder::new();
        let source = RefOr::reference("#/components/schemas/Missing");
        assert_eq!(
            convert(&table, &source),
            Err(CompileError::UnresolvedRef("#/components/schemas/Missing".into()))
        );
        let external = RefOr::reference("other.yaml#/Pet");
        assert!(matches!(
            convert(&table, &external),
            Err(CompileError::UnresolvedRef(_))
        ));
    }

    #[test]
    fn test_unsupported_type_is_dropped() {
        let table = TableBuilder::new();
        let schema = convert_object(&table, &object(json!({"type": "file", "format": "binary"}))).unwrap();
        assert_eq!(schema.kind, None);
        assert_eq!(schema.format.as_deref(), Some("binary"));
    }
}
