//! Document to Spec IR

use crate::convert::convert;
use crate::errors::{CompileError, Result};
use crate::openapi::{
    json_media, Document, MediaType, Operation, Parameter, ParameterLocation, PathItem, RefOr,
    SchemaObject, Server, PARAMETER_REF_PREFIX, REQUEST_BODY_REF_PREFIX, RESPONSE_REF_PREFIX,
    SCHEMA_REF_PREFIX,
};
use crate::paths::path_partials;
use crate::table::TableBuilder;
use monkey_types::{
    Endpoint, Method, Param, ParamKind, Schema, Sid, SpecIR, StatusBucket, UnsupportedMethod,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info};
use url::Url;

const SUPPORTED_VERSION_PREFIX: &str = "3.0.";

#[derive(Deserialize)]
struct VersionProbe {
    #[serde(default)]
    openapi: Option<String>,
    #[serde(default)]
    swagger: Option<String>,
}

/// Load a JSON or YAML API description.
pub fn parse_document(text: &str) -> Result<Document> {
    let probe: VersionProbe =
        serde_yaml::from_str(text).map_err(|err| CompileError::Malformed(err.to_string()))?;
    match (probe.openapi, probe.swagger) {
        (Some(version), _) => check_version(&version)?,
        (None, Some(version)) => {
            return Err(CompileError::UnsupportedVersion(format!("swagger {version}")))
        }
        (None, None) => return Err(CompileError::Malformed("missing `openapi` field".into())),
    }
    serde_yaml::from_str(text).map_err(|err| CompileError::Malformed(err.to_string()))
}

fn check_version(version: &str) -> Result<()> {
    if version.starts_with(SUPPORTED_VERSION_PREFIX) {
        Ok(())
    } else {
        Err(CompileError::UnsupportedVersion(version.to_string()))
    }
}

/// Parse then compile.
pub fn compile_str(text: &str) -> Result<SpecIR> {
    compile(&parse_document(text)?)
}

/// Compile a document into its canonical IR.
///
/// The result depends only on the document content: schemas, paths and
/// methods are visited in sorted order.
pub fn compile(document: &Document) -> Result<SpecIR> {
    check_version(&document.openapi)?;
    let base = base_path(&document.servers)?;

    let mut compiler = Compiler {
        document,
        table: TableBuilder::new(),
    };
    compiler.seed_named()?;

    let mut endpoints = Vec::new();
    for (template, item) in &document.paths {
        if item.connect.is_some() {
            return Err(CompileError::UnsupportedMethod {
                path: template.clone(),
                source: UnsupportedMethod("CONNECT".into()),
            });
        }
        for (method, operation) in item.operations() {
            let endpoint = compiler.endpoint(&base, template, item, method, operation)?;
            debug!(endpoint = %endpoint, inputs = endpoint.inputs.len(), outputs = endpoint.outputs.len(), "compiled endpoint");
            endpoints.push(endpoint);
        }
    }

    let schemas = compiler.table.finish();
    info!(
        endpoints = endpoints.len(),
        schemas = schemas.len(),
        base = %base,
        "compiled API description"
    );
    Ok(SpecIR { endpoints, schemas })
}

/// Absolute path prefix every endpoint lives under.
pub fn base_path(servers: &[Server]) -> Result<String> {
    let Some(server) = servers.first() else {
        return Ok("/".to_string());
    };
    if servers.len() > 1 {
        info!(url = %server.url, declared = servers.len(), "several servers declared, using the first");
    }

    let mut url = server.url.clone();
    for (name, variable) in &server.variables {
        url = url.replace(&format!("{{{name}}}"), &variable.default);
    }
    let invalid = |reason: &str| CompileError::InvalidServerUrl {
        url: server.url.clone(),
        reason: reason.to_string(),
    };
    if url.contains('{') || url.contains('}') {
        return Err(invalid("undeclared server variable"));
    }

    if url.starts_with('/') {
        return Ok(url);
    }
    let parsed = Url::parse(&url).map_err(|err| invalid(&err.to_string()))?;
    if parsed.cannot_be_a_base() {
        return Err(invalid("no absolute path component"));
    }
    Ok(parsed.path().to_string())
}

fn param_kind(location: ParameterLocation) -> ParamKind {
    match location {
        ParameterLocation::Path => ParamKind::Path,
        ParameterLocation::Query => ParamKind::Query,
        ParameterLocation::Header => ParamKind::Header,
        ParameterLocation::Cookie => ParamKind::Cookie,
    }
}

/// Follow `$ref`s into a components section until an object is reached.
fn resolve<'a, T>(
    item: &'a RefOr<T>,
    pool: &'a BTreeMap<String, RefOr<T>>,
    prefix: &str,
) -> Result<&'a T> {
    let mut current = item;
    let mut hops = 0;
    loop {
        match current {
            RefOr::Item(value) => return Ok(value),
            RefOr::Ref(reference) => {
                let unresolved = || CompileError::UnresolvedRef(reference.reference.clone());
                if hops > pool.len() {
                    return Err(unresolved());
                }
                hops += 1;
                current = reference
                    .reference
                    .strip_prefix(prefix)
                    .and_then(|name| pool.get(name))
                    .ok_or_else(unresolved)?;
            }
        }
    }
}

struct Compiler<'a> {
    document: &'a Document,
    table: TableBuilder,
}

impl<'a> Compiler<'a> {
    /// Reserve every named schema first so forward references resolve, then
    /// convert their content in the same order.
    fn seed_named(&mut self) -> Result<()> {
        let document = self.document;
        let schemas = &document.components.schemas;
        for name in schemas.keys() {
            self.table.reserve_named(&format!("{SCHEMA_REF_PREFIX}{name}"));
        }
        for (name, source) in schemas {
            let sid = self.table.reserve_named(&format!("{SCHEMA_REF_PREFIX}{name}"));
            let schema = convert(&self.table, source)?;
            self.table.fill(sid, schema);
        }
        Ok(())
    }

    fn intern(&mut self, source: &RefOr<SchemaObject>) -> Result<Sid> {
        let schema = convert(&self.table, source)?;
        Ok(self.table.intern(schema))
    }

    fn intern_media(&mut self, media: &MediaType) -> Result<Sid> {
        match &media.schema {
            Some(source) => self.intern(source),
            None => Ok(self.table.intern(Schema::default().into())),
        }
    }

    fn endpoint(
        &mut self,
        base: &str,
        template: &str,
        item: &'a PathItem,
        method: Method,
        operation: &'a Operation,
    ) -> Result<Endpoint> {
        let document = self.document;
        let components = &document.components;
        let mut inputs = Vec::new();

        if let Some(body) = &operation.request_body {
            let body = resolve(body, &components.request_bodies, REQUEST_BODY_REF_PREFIX)?;
            if let Some(media) = json_media(&body.content) {
                inputs.push(Param {
                    kind: ParamKind::Body,
                    name: String::new(),
                    required: body.required,
                    sid: self.intern_media(media)?,
                });
            }
        }

        // Operation-level parameters override path-level ones on (in, name).
        let mut declared: BTreeMap<(ParamKind, String), &'a Parameter> = BTreeMap::new();
        for param in item.parameters.iter().chain(&operation.parameters) {
            let param = resolve(param, &components.parameters, PARAMETER_REF_PREFIX)?;
            declared.insert((param_kind(param.location), param.name.clone()), param);
        }
        for ((kind, name), param) in declared {
            let sid = match (&param.schema, json_media(&param.content)) {
                (Some(source), _) => self.intern(source)?,
                (None, Some(media)) => self.intern_media(media)?,
                (None, None) => self.table.intern(Schema::default().into()),
            };
            inputs.push(Param {
                kind,
                name,
                required: kind == ParamKind::Path || param.required,
                sid,
            });
        }

        let mut outputs = BTreeMap::new();
        for (key, response) in &operation.responses {
            let bucket =
                StatusBucket::parse(key).map_err(|source| CompileError::BadStatusCode {
                    endpoint: format!("{method} {template}"),
                    source,
                })?;
            let response = resolve(response, &components.responses, RESPONSE_REF_PREFIX)?;
            if let Some(media) = json_media(&response.content) {
                outputs.insert(bucket, self.intern_media(media)?);
            }
        }

        let path = path_partials(base, template, &inputs)?;
        Ok(Endpoint {
            method,
            path,
            inputs,
            outputs,
        })
    }
}
