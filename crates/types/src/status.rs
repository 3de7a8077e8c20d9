//! Response status keys and their integer encoding
//!
//! `default` encodes as `0`, the ranges `1XX`..`5XX` as `1`..`5` and any
//! literal code `100`..`599` as itself. The two numeric ranges never meet, so
//! the encoding is reversible over its whole domain.

use crate::errors::InvalidStatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const DEFAULT_KEY: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct StatusBucket(u16);

impl StatusBucket {
    pub const DEFAULT: StatusBucket = StatusBucket(0);

    /// Encode a response key as found in an API description.
    pub fn parse(key: &str) -> Result<Self, InvalidStatusCode> {
        let invalid = || InvalidStatusCode(key.to_string());

        if key == DEFAULT_KEY {
            return Ok(Self::DEFAULT);
        }

        let bytes = key.as_bytes();
        if bytes.len() != 3 || !bytes[0].is_ascii_digit() {
            return Err(invalid());
        }

        let lead = u16::from(bytes[0] - b'0');
        if bytes[1..].iter().all(|b| b.eq_ignore_ascii_case(&b'X')) {
            return if (1..=5).contains(&lead) {
                Ok(Self(lead))
            } else {
                Err(invalid())
            };
        }

        if !bytes[1..].iter().all(u8::is_ascii_digit) {
            return Err(invalid());
        }
        let code: u16 = key.parse().map_err(|_| invalid())?;
        Self::try_from(code).map_err(|_| invalid())
    }

    pub fn code(&self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for StatusBucket {
    type Error = InvalidStatusCode;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            0..=5 | 100..=599 => Ok(Self(code)),
            _ => Err(InvalidStatusCode(code.to_string())),
        }
    }
}

impl From<StatusBucket> for u16 {
    fn from(bucket: StatusBucket) -> Self {
        bucket.0
    }
}

impl FromStr for StatusBucket {
    type Err = InvalidStatusCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for StatusBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => f.write_str(DEFAULT_KEY),
            lead @ 1..=5 => write!(f, "{lead}XX"),
            code => write!(f, "{code}"),
        }
    }
}
