//! Spec IR back to an OpenAPI document
//!
//! Named entries become `components.schemas`, anonymous entries are inlined
//! where they are used. The base path is already folded into every path, so
//! the rebuilt document declares `/` as its only server.

use crate::convert::{to_object, to_ref_or};
use crate::errors::{CompileError, Result};
use crate::openapi::{
    Components, Document, Info, MediaType, Operation, Parameter, ParameterLocation, PathItem,
    RefOr, RequestBody, Response, SchemaObject, Server, SCHEMA_REF_PREFIX,
};
use monkey_types::{ParamKind, SchemaOrPtr, SchemaTable, Sid, SpecIR};
use std::collections::BTreeMap;

pub const DECOMPILED_VERSION: &str = "3.0.3";
const JSON: &str = "application/json";

fn json_content(schema: RefOr<SchemaObject>) -> BTreeMap<String, MediaType> {
    let mut content = BTreeMap::new();
    content.insert(
        JSON.to_string(),
        MediaType {
            schema: Some(schema),
        },
    );
    content
}

/// How an endpoint refers to `sid`: by name when it is named, inline otherwise.
fn schema_for(table: &SchemaTable, sid: Sid) -> Result<RefOr<SchemaObject>> {
    let entry = table
        .get(sid)
        .ok_or_else(|| CompileError::UnresolvedRef(format!("sid {sid}")))?;
    match (&entry.name, &entry.schema) {
        (Some(name), _) => Ok(RefOr::reference(name.clone())),
        (None, schema) => Ok(to_ref_or(schema)),
    }
}

fn location(kind: ParamKind) -> Option<ParameterLocation> {
    match kind {
        ParamKind::Body => None,
        ParamKind::Path => Some(ParameterLocation::Path),
        ParamKind::Query => Some(ParameterLocation::Query),
        ParamKind::Header => Some(ParameterLocation::Header),
        ParamKind::Cookie => Some(ParameterLocation::Cookie),
    }
}

pub fn decompile(ir: &SpecIR) -> Result<Document> {
    let mut components = Components::default();
    for (_, entry) in ir.schemas.iter() {
        let Some(reference) = &entry.name else {
            continue;
        };
        let name = reference
            .strip_prefix(SCHEMA_REF_PREFIX)
            .ok_or_else(|| CompileError::UnresolvedRef(reference.clone()))?;
        let schema = match &entry.schema {
            SchemaOrPtr::Ptr(ptr) => RefOr::reference(ptr.reference.clone()),
            SchemaOrPtr::Schema(schema) => RefOr::Item(to_object(schema)),
        };
        components.schemas.insert(name.to_string(), schema);
    }

    let mut paths: BTreeMap<String, PathItem> = BTreeMap::new();
    for endpoint in &ir.endpoints {
        let mut operation = Operation::default();
        for param in &endpoint.inputs {
            let schema = schema_for(&ir.schemas, param.sid)?;
            match location(param.kind) {
                None => {
                    operation.request_body = Some(RefOr::Item(RequestBody {
                        required: param.required,
                        content: json_content(schema),
                    }))
                }
                Some(location) => operation.parameters.push(RefOr::Item(Parameter {
                    name: param.name.clone(),
                    location,
                    required: param.required,
                    schema: Some(schema),
                    content: BTreeMap::new(),
                })),
            }
        }
        for (bucket, sid) in &endpoint.outputs {
            operation.responses.insert(
                bucket.to_string(),
                RefOr::Item(Response {
                    description: String::new(),
                    content: json_content(schema_for(&ir.schemas, *sid)?),
                }),
            );
        }
        paths
            .entry(endpoint.template())
            .or_default()
            .set_operation(endpoint.method, operation);
    }

    Ok(Document {
        openapi: DECOMPILED_VERSION.to_string(),
        info: Info {
            title: "decompiled".to_string(),
            version: "0.0.0".to_string(),
        },
        servers: vec![Server {
            url: "/".to_string(),
            variables: BTreeMap::new(),
        }],
        paths,
        components,
    })
}
