//! JSON payload validation against compiled schema tables

pub mod draft4;
pub mod engine;
pub mod errors;

pub use engine::{SchemaValidator, ValidationIssue};
pub use errors::{Result, ValidatorError};
