//! Canonical, byte-stable encoding of extracted tag values.
//!
//! Every value is first normalized into a `serde_json::Value` (mapping keys
//! sorted, dates and buffers stringified, wide integers as decimal strings)
//! and then rendered as compact JSON. Two logically equal values always yield
//! the same bytes, whatever order their mappings were read in.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat};
use serde_json::{Map, Number, Value};

/// A metadata value as read from the image, before canonicalization.
#[derive(Clone, Debug, PartialEq)]
pub enum TagValue {
    Null,
    Bool(bool),
    Integer(i128),
    Float(f64),
    String(String),
    DateTime(TagDateTime),
    Bytes(Vec<u8>),
    List(Vec<TagValue>),
    /// Entries in read order; order carries no meaning.
    Map(Vec<(String, TagValue)>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagDateTime {
    Date(NaiveDate),
    Naive(NaiveDateTime),
    Offset(DateTime<FixedOffset>),
}

impl TagDateTime {
    pub fn to_iso8601(&self) -> String {
        match self {
            TagDateTime::Date(date) => date.format("%Y-%m-%d").to_string(),
            TagDateTime::Naive(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            TagDateTime::Offset(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }

    /// Parse ExifTool's `YYYY:MM:DD[ HH:MM:SS[.fff][±HH:MM|Z]]` layout.
    pub fn parse_exiftool(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.len() < 10 || raw.as_bytes().get(4) != Some(&b':') {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_str(raw, "%Y:%m:%d %H:%M:%S%.f%:z") {
            return Some(TagDateTime::Offset(dt));
        }
        if let Some(utc) = raw.strip_suffix('Z') {
            if let Ok(naive) = NaiveDateTime::parse_from_str(utc, "%Y:%m:%d %H:%M:%S%.f") {
                let offset = FixedOffset::east_opt(0)?;
                return Some(TagDateTime::Offset(naive.and_local_timezone(offset).single()?));
            }
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y:%m:%d %H:%M:%S%.f") {
            return Some(TagDateTime::Naive(naive));
        }
        NaiveDate::parse_from_str(raw, "%Y:%m:%d")
            .ok()
            .map(TagDateTime::Date)
    }
}

impl TagValue {
    /// Decode one value of `exiftool -json` output.
    pub fn from_exiftool_json(value: &Value) -> Self {
        match value {
            Value::Null => TagValue::Null,
            Value::Bool(b) => TagValue::Bool(*b),
            Value::Number(n) => decode_number(n),
            Value::String(s) => {
                if let Some(encoded) = s.strip_prefix("base64:") {
                    if let Ok(bytes) = BASE64.decode(encoded) {
                        return TagValue::Bytes(bytes);
                    }
                }
                match TagDateTime::parse_exiftool(s) {
                    Some(dt) => TagValue::DateTime(dt),
                    None => TagValue::String(s.clone()),
                }
            }
            Value::Array(items) => {
                TagValue::List(items.iter().map(TagValue::from_exiftool_json).collect())
            }
            Value::Object(entries) => TagValue::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), TagValue::from_exiftool_json(v)))
                    .collect(),
            ),
        }
    }
}

// Relies on `arbitrary_precision`: `n.to_string()` is the literal ExifTool
// printed, so integers of any width are read without an f64 detour.
fn decode_number(n: &Number) -> TagValue {
    let literal = n.to_string();
    let digits = literal.strip_prefix('-').unwrap_or(&literal);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return match literal.parse::<i128>() {
            Ok(i) => TagValue::Integer(i),
            Err(_) => TagValue::String(literal),
        };
    }
    TagValue::Float(n.as_f64().unwrap_or(f64::NAN))
}

pub fn normalize(value: &TagValue) -> Value {
    match value {
        TagValue::Null => Value::Null,
        TagValue::Bool(b) => Value::Bool(*b),
        TagValue::Integer(i) => normalize_integer(*i),
        TagValue::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        TagValue::String(s) => Value::String(s.clone()),
        TagValue::DateTime(dt) => Value::String(dt.to_iso8601()),
        TagValue::Bytes(bytes) => Value::String(::hex::encode(bytes)),
        TagValue::List(items) => Value::Array(items.iter().map(normalize).collect()),
        TagValue::Map(entries) => {
            let mut sorted: Vec<&(String, TagValue)> = entries.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            let mut map = Map::new();
            for (key, value) in sorted {
                map.insert(key.clone(), normalize(value));
            }
            Value::Object(map)
        }
    }
}

// Integers outside the 64-bit range become decimal strings rather than
// passing through f64.
fn normalize_integer(i: i128) -> Value {
    if let Ok(small) = i64::try_from(i) {
        Value::Number(small.into())
    } else if let Ok(unsigned) = u64::try_from(i) {
        Value::Number(unsigned.into())
    } else {
        Value::String(i.to_string())
    }
}

/// Compact JSON rendering of `normalize(value)`.
pub fn canonical_bytes(value: &TagValue) -> Vec<u8> {
    normalize(value).to_string().into_bytes()
}
