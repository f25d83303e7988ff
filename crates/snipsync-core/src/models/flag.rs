//! Serde adapter for boolean flags that clients send as `0`/`1`.
//!
//! Accepts JSON booleans or the integers 0 and 1, always writes an integer.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

#[allow(clippy::trivially_copy_pass_by_ref)] // serde `with` signature
pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Bool(bool),
        Int(i64),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Bool(value) => Ok(value),
        Repr::Int(0) => Ok(false),
        Repr::Int(1) => Ok(true),
        Repr::Int(other) => Err(D::Error::custom(format!(
            "expected a 0/1 flag, got {other}"
        ))),
    }
}
