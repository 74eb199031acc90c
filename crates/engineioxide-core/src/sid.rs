use std::{fmt, str::FromStr};

use base64::Engine;
use rand::Rng;

use crate::Str;

/// An engine.io session id assigned by the server during the handshake.
///
/// Servers are free to choose the length of their ids (`engine.io` uses 20 chars,
/// `engineioxide` 16 chars), so any non empty url safe base64 string is accepted.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sid(Str);

impl Sid {
    /// Generate a new random session id (base64 16 chars)
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the session id as a str
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Error type for [`Sid::from_str`]
#[derive(Debug)]
pub enum SidDecodeError {
    /// Invalid base64 string
    InvalidBase64String,
    /// Invalid length
    InvalidLength,
}
impl fmt::Display for SidDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SidDecodeError::InvalidBase64String => write!(f, "Invalid url base64 string"),
            SidDecodeError::InvalidLength => write!(f, "Invalid sid length"),
        }
    }
}
impl std::error::Error for SidDecodeError {}

impl FromStr for Sid {
    type Err = SidDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use SidDecodeError::*;

        if s.is_empty() || s.len() > 64 {
            return Err(InvalidLength);
        }

        let valid = s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !valid {
            return Err(InvalidBase64String);
        }
        Ok(Sid(Str::copy_from_slice(s)))
    }
}

impl Default for Sid {
    fn default() -> Self {
        let mut random = [0u8; 12]; // 12 bytes = 16 chars base64
        rand::rng().fill(&mut random);

        let id = base64::prelude::BASE64_URL_SAFE_NO_PAD.encode(random);
        Sid(Str::from(id))
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl fmt::Debug for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for Sid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

struct SidVisitor;
impl serde::de::Visitor<'_> for SidVisitor {
    type Value = Sid;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a valid sid")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Sid::from_str(v).map_err(serde::de::Error::custom)
    }
}
impl<'de> serde::Deserialize<'de> for Sid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(SidVisitor)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::sid::Sid;

    #[test]
    fn sid_from_str() {
        let id = Sid::new();
        assert_eq!(id.as_str().len(), 16);
        let id2 = Sid::from_str(&id.to_string()).unwrap();
        assert_eq!(id, id2);
        let id = Sid::from_str("AA9AAA0AAzAAAAHs").unwrap();
        assert_eq!(id.to_string(), "AA9AAA0AAzAAAAHs");
    }

    #[test]
    fn sid_from_node_server() {
        // engine.io node servers emit 20 chars ids
        let id = Sid::from_str("lv_VI97HAXpY6yYWAAAC").unwrap();
        assert_eq!(id.as_str(), "lv_VI97HAXpY6yYWAAAC");
    }

    #[test]
    fn sid_from_str_invalid() {
        let id = Sid::from_str("").unwrap_err();
        assert_eq!(id.to_string(), "Invalid sid length");
        let id = Sid::from_str("aoassaAZDoin#zd{").unwrap_err();
        assert_eq!(id.to_string(), "Invalid url base64 string");
        let id = Sid::from_str("aoassaAZDoinazd<").unwrap_err();
        assert_eq!(id.to_string(), "Invalid url base64 string");
    }

    #[test]
    fn sid_serde() {
        let id: Sid = serde_json::from_str("\"AA9AAA0AAzAAAAHs\"").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"AA9AAA0AAzAAAAHs\"");
    }
}
