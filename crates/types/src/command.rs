//! Commands sent by the oracle
//!
//! Decoding peeks the `cmd` discriminator first and only then commits to a
//! payload shape, so a malformed payload for a known tag and an unknown tag
//! are reported differently.

use crate::errors::CommandDecodeError;
use crate::method::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Position of a request inside the running campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lane {
    pub test_index: u32,
    pub request_index: u32,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.test_index, self.request_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A fully described HTTP call, as chosen by the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReqCommand {
    pub lane: Lane,
    pub request: HttpRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneCommand {
    pub failure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Start,
    Reset,
    Stop,
    Req,
    Done,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Start => "start",
            CommandKind::Reset => "reset",
            CommandKind::Stop => "stop",
            CommandKind::Req => "req",
            CommandKind::Done => "done",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum Command {
    Start,
    Reset,
    Stop,
    Req(ReqCommand),
    Done(DoneCommand),
}

impl Command {
    /// Decode a command received from the oracle.
    pub fn decode(bytes: &[u8]) -> Result<Self, CommandDecodeError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, CommandDecodeError> {
        let tag = value
            .get("cmd")
            .and_then(Value::as_str)
            .ok_or(CommandDecodeError::MissingTag)?;

        match tag {
            "req" => Ok(Command::Req(serde_json::from_value(value)?)),
            "reset" => Ok(Command::Reset),
            "done" => Ok(Command::Done(serde_json::from_value(value)?)),
            "start" | "stop" => Err(CommandDecodeError::DriverOnly(tag.to_string())),
            other => Err(CommandDecodeError::UnknownTag(other.to_string())),
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Start => CommandKind::Start,
            Command::Reset => CommandKind::Reset,
            Command::Stop => CommandKind::Stop,
            Command::Req(_) => CommandKind::Req,
            Command::Done(_) => CommandKind::Done,
        }
    }
}
