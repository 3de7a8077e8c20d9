//! Shared types of the monkey contract fuzzer
//!
//! The compiled Spec IR (endpoints plus schema table), the commands the
//! oracle sends, the outcomes reported back, and the process exit codes.

pub mod command;
pub mod endpoint;
pub mod errors;
pub mod exit_code;
pub mod method;
pub mod outcome;
pub mod schema;
pub mod spec_ir;
pub mod status;

pub use command::*;
pub use endpoint::*;
pub use errors::*;
pub use exit_code::ExitCode;
pub use method::Method;
pub use outcome::*;
pub use schema::*;
pub use spec_ir::SpecIR;
pub use status::StatusBucket;

/// Identifies this client to the oracle and to targets.
pub const CLIENT_NAME: &str = "monkey";
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn user_agent() -> String {
    format!("{CLIENT_NAME}/{CLIENT_VERSION}")
}
