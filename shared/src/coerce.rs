//! Lenient deserializers for arguments that the automation host may pass as
//! strings (`"9100"`, `"yes"`) instead of their native JSON types.

use serde::{de, Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInt {
    Int(u64),
    Str(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Int(u64),
    Str(String),
}

/// Optional unsigned integer, given either as a number or a numeric string.
pub fn opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawInt>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawInt::Int(n)) => Ok(Some(n)),
        Some(RawInt::Str(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid integer value: {:?}", s))),
    }
}

/// Boolean in any of the spellings the host accepts for `type: bool`.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match RawFlag::deserialize(deserializer)? {
        RawFlag::Bool(b) => Ok(b),
        RawFlag::Int(0) => Ok(false),
        RawFlag::Int(1) => Ok(true),
        RawFlag::Int(n) => Err(de::Error::custom(format!("invalid boolean value: {}", n))),
        RawFlag::Str(s) => parse_flag(&s)
            .ok_or_else(|| de::Error::custom(format!("invalid boolean value: {:?}", s))),
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "yes" | "on" | "true" | "1" | "y" | "t" => Some(true),
        "no" | "off" | "false" | "0" | "n" | "f" => Some(false),
        _ => None,
    }
}
