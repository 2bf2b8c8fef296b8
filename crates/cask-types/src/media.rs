use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A media type reduced to its lowercase `type/subtype` essence.
///
/// Parameters (`; charset=utf-8`) and surrounding whitespace are dropped on
/// parse, so `Text/Plain; charset=utf-8` and `text/plain` compare equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MediaType(String);

impl MediaType {
    pub const OCTET_STREAM: &'static str = "application/octet-stream";
    pub const TEXT_PLAIN: &'static str = "text/plain";

    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let essence = raw.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        let valid = match essence.split_once('/') {
            Some((kind, sub)) => {
                !kind.is_empty()
                    && !sub.is_empty()
                    && !sub.contains('/')
                    && essence.chars().all(|c| !c.is_whitespace() && !c.is_control())
            }
            None => false,
        };
        if !valid {
            return Err(TypeError::InvalidMediaType(raw.to_string()));
        }
        Ok(Self(essence))
    }

    /// Build from a string known to already be a valid essence.
    ///
    /// Used for the sniffer's static table.
    pub fn from_static(essence: &'static str) -> Self {
        Self(essence.to_string())
    }

    pub fn octet_stream() -> Self {
        Self::from_static(Self::OCTET_STREAM)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MediaType({})", self.0)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MediaType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
