//! OpenAPI 3.0 to Spec IR compiler
//!
//! [`compile`] turns a parsed document into endpoints plus a deduplicated
//! schema table; [`decompile`] goes the other way for inspection and
//! round-trip checks.

pub mod compile;
mod convert;
pub mod decompile;
pub mod errors;
pub mod lint;
pub mod openapi;
pub mod paths;
pub mod table;

pub use compile::{base_path, compile, compile_str, parse_document};
pub use decompile::decompile;
pub use errors::{CompileError, Result};
pub use lint::{lint, LintReport};
pub use openapi::Document;
pub use table::TableBuilder;
