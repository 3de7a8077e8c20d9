use crate::method::Method;
use crate::schema::Sid;
use crate::status::StatusBucket;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Where an input is carried in a request.
///
/// Variant order is the sort order of an endpoint's inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Body,
    Path,
    Query,
    Header,
    Cookie,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::Body => "body",
            ParamKind::Path => "path",
            ParamKind::Query => "query",
            ParamKind::Header => "header",
            ParamKind::Cookie => "cookie",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed input of an endpoint. Body inputs have an empty name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub kind: ParamKind,
    pub name: String,
    pub required: bool,
    pub sid: Sid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathParamRef {
    pub name: String,
    pub sid: Sid,
}

/// A piece of a templated path: literal text or a path input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathPartial {
    Part(String),
    Ptr(PathParamRef),
}

impl PathPartial {
    pub fn literal(text: impl Into<String>) -> Self {
        PathPartial::Part(text.into())
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            PathPartial::Part(text) => Some(text),
            PathPartial::Ptr(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub method: Method,
    pub path: Vec<PathPartial>,
    #[serde(default)]
    pub inputs: Vec<Param>,
    #[serde(default)]
    pub outputs: BTreeMap<StatusBucket, Sid>,
}

impl Endpoint {
    /// The path rebuilt as a template, e.g. `/v1/pets/{id}`.
    pub fn template(&self) -> String {
        let mut out = String::new();
        for partial in &self.path {
            match partial {
                PathPartial::Part(text) => out.push_str(text),
                PathPartial::Ptr(param) => {
                    out.push('{');
                    out.push_str(&param.name);
                    out.push('}');
                }
            }
        }
        out
    }

    pub fn input(&self, kind: ParamKind, name: &str) -> Option<&Param> {
        self.inputs
            .iter()
            .find(|param| param.kind == kind && param.name == name)
    }

    pub fn body(&self) -> Option<&Param> {
        self.inputs.iter().find(|param| param.kind == ParamKind::Body)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template())
    }
}
