use crate::draft4::document_for;
use crate::errors::{Result, ValidatorError};
use jsonschema::{Draft, Validator};
use monkey_types::{SchemaTable, Sid};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const NAMED_PREFIX: &str = "#/components/schemas/";

/// One mismatch between a payload and its schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// JSON pointer into the payload; empty for the root.
    pub path: String,
    /// The violated keyword, e.g. `required` or `type`.
    pub keyword: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{path}: {} ({})", self.message, self.keyword)
    }
}

/// Validates payloads against entries of one schema table.
///
/// Each sid is compiled on first use and cached; the table itself is never
/// modified.
pub struct SchemaValidator {
    table: SchemaTable,
    compiled: RwLock<HashMap<Sid, Arc<Validator>>>,
}

impl SchemaValidator {
    pub fn new(table: &SchemaTable) -> Self {
        Self {
            table: table.clone(),
            compiled: RwLock::new(HashMap::new()),
        }
    }

    pub fn table(&self) -> &SchemaTable {
        &self.table
    }

    /// Accepts `#/components/schemas/Name`, a bare `Name`, or a decimal sid.
    pub fn resolve_ref(&self, reference: &str) -> Result<Sid> {
        let no_such = || ValidatorError::NoSuchRef(reference.to_string());

        if let Ok(raw) = reference.parse::<u32>() {
            let sid = Sid(raw);
            return self.table.get(sid).map(|_| sid).ok_or_else(no_such);
        }
        let absolute = if reference.starts_with(NAMED_PREFIX) {
            reference.to_string()
        } else {
            format!("{NAMED_PREFIX}{reference}")
        };
        self.table.sid_of(&absolute).ok_or_else(no_such)
    }

    pub fn validate_ref(&self, reference: &str, value: &Value) -> Result<Vec<ValidationIssue>> {
        let sid = self.resolve_ref(reference)?;
        self.validate(sid, value)
    }

    /// Every mismatch of `value` against `sid`. Empty means it conforms.
    pub fn validate(&self, sid: Sid, value: &Value) -> Result<Vec<ValidationIssue>> {
        let validator = self.compiled(sid)?;
        let issues = validator
            .iter_errors(value)
            .map(|error| {
                let schema_path = error.schema_path.to_string();
                ValidationIssue {
                    path: error.instance_path.to_string(),
                    keyword: schema_path
                        .rsplit('/')
                        .next()
                        .unwrap_or_default()
                        .to_string(),
                    message: error.to_string(),
                }
            })
            .collect();
        Ok(issues)
    }

    fn compiled(&self, sid: Sid) -> Result<Arc<Validator>> {
        if let Some(existing) = self.compiled.read().get(&sid) {
            return Ok(Arc::clone(existing));
        }

        let document = document_for(&self.table, sid)?;
        let validator = jsonschema::options()
            .with_draft(Draft::Draft4)
            .build(&document)
            .map_err(|err| ValidatorError::InvalidSchema {
                sid,
                message: err.to_string(),
            })?;
        debug!(%sid, "compiled schema validator");

        let validator = Arc::new(validator);
        Ok(Arc::clone(
            self.compiled
                .write()
                .entry(sid)
                .or_insert_with(|| Arc::clone(&validator)),
        ))
    }

    /// Number of sids compiled so far.
    pub fn cached(&self) -> usize {
        self.compiled.read().len()
    }
}
