use crate::compile::compile_str;
use crate::errors::Result;
use serde::Serialize;
use std::fmt;

/// Summary of a document that compiled cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LintReport {
    pub endpoints: usize,
    pub schemas: usize,
    pub named_schemas: usize,
}

impl fmt::Display for LintReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} endpoints, {} schemas ({} named)",
            self.endpoints, self.schemas, self.named_schemas
        )
    }
}

pub fn lint(text: &str) -> Result<LintReport> {
    let ir = compile_str(text)?;
    Ok(LintReport {
        endpoints: ir.endpoints.len(),
        schemas: ir.schemas.len(),
        named_schemas: ir.schemas.iter().filter(|(_, entry)| entry.is_named()).count(),
    })
}
