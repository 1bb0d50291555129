use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::repository::RepositoryError;

pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "_id";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid identifier: {0}")]
pub struct InvalidObjectId(pub String);

/// Store-assigned identifier: 4-byte seconds timestamp, 5 random bytes and a
/// 3-byte counter, rendered as 24 lowercase hex characters.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ObjectId([u8; 12]);

static COUNTER: AtomicU32 = AtomicU32::new(0);

impl ObjectId {
    pub fn new() -> Self {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as u32;
        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        rand::thread_rng().fill(&mut bytes[4..9]);
        let count = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn parse(input: &str) -> Result<Self, InvalidObjectId> {
        let invalid = || InvalidObjectId(input.to_string());
        if input.len() != 24 || !input.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let mut bytes = [0u8; 12];
        for (index, byte) in bytes.iter_mut().enumerate() {
            let pair = &input[index * 2..index * 2 + 2];
            *byte = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

pub fn id_value(id: &ObjectId) -> Value {
    Value::String(id.to_hex())
}

pub fn to_document<T: Serialize>(record: &T) -> Result<Document, RepositoryError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(RepositoryError::Serialization(
            "record did not serialise to an object".to_string(),
        )),
        Err(err) => Err(RepositoryError::Serialization(err.to_string())),
    }
}

pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T, RepositoryError> {
    serde_json::from_value(Value::Object(document))
        .map_err(|err| RepositoryError::Serialization(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_hex_is_stable() {
        let id = ObjectId::new();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 24);
        assert_eq!(ObjectId::parse(&hex), Ok(id));
    }

    #[test]
    fn object_id_rejects_malformed_input() {
        assert!(ObjectId::parse("").is_err());
        assert!(ObjectId::parse("not-an-id").is_err());
        assert!(ObjectId::parse("zzzzzzzzzzzzzzzzzzzzzzzz").is_err());
        assert!(ObjectId::parse("65a1b2c3d4e5f6a7b8c9d0e1f").is_err());
        assert!(ObjectId::parse(&"+f".repeat(12)).is_err());
        assert!(ObjectId::parse(" 5a1b2c3d4e5f6a7b8c9d0e1").is_err());
    }

    #[test]
    fn sequential_ids_differ() {
        assert_ne!(ObjectId::new(), ObjectId::new());
    }
}
