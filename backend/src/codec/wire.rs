//! Wire-side values and types exposed to API clients.

use std::fmt;

use serde_json::Number;

/// A value as clients see it. Maps travel as lists of `Pair`s because the
/// store's map keys need not be strings.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<WireValue>),
    Pair(Box<WireValue>, Box<WireValue>),
}

impl WireValue {
    pub fn pair(key: WireValue, value: WireValue) -> Self {
        WireValue::Pair(Box::new(key), Box::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null)
    }

    /// Name of the wire kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            WireValue::Null => "null",
            WireValue::Bool(_) => "boolean",
            WireValue::Number(_) => "number",
            WireValue::String(_) => "string",
            WireValue::List(_) => "list",
            WireValue::Pair(_, _) => "key/value entry",
        }
    }

    /// Convert to plain JSON; pairs become `{"key": .., "value": ..}`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            WireValue::Null => Json::Null,
            WireValue::Bool(b) => Json::Bool(*b),
            WireValue::Number(n) => Json::Number(n.clone()),
            WireValue::String(s) => Json::String(s.clone()),
            WireValue::List(items) => Json::Array(items.iter().map(WireValue::to_json).collect()),
            WireValue::Pair(k, v) => {
                let mut map = serde_json::Map::new();
                map.insert("key".to_string(), k.to_json());
                map.insert("value".to_string(), v.to_json());
                Json::Object(map)
            }
        }
    }

    /// Read plain JSON. Objects are only meaningful as `{key, value}` pairs.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, String> {
        use serde_json::Value as Json;
        Ok(match json {
            Json::Null => WireValue::Null,
            Json::Bool(b) => WireValue::Bool(*b),
            Json::Number(n) => WireValue::Number(n.clone()),
            Json::String(s) => WireValue::String(s.clone()),
            Json::Array(items) => WireValue::List(
                items
                    .iter()
                    .map(WireValue::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            Json::Object(map) => match (map.get("key"), map.get("value")) {
                (Some(k), Some(v)) if map.len() == 2 => {
                    WireValue::pair(WireValue::from_json(k)?, WireValue::from_json(v)?)
                }
                _ => return Err("objects must have exactly 'key' and 'value'".to_string()),
            },
        })
    }
}

/// Leaf wire types. Several native types may share one (Int8/16/32 → Int).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WireScalar {
    Int,
    Float,
    Boolean,
    String,
    BigInt,
    Counter,
    Varint,
    Decimal,
    Ascii,
    Uuid,
    TimeUuid,
    Inet,
    Blob,
    Timestamp,
    Time,
}

impl WireScalar {
    pub const ALL: [WireScalar; 15] = [
        WireScalar::Int,
        WireScalar::Float,
        WireScalar::Boolean,
        WireScalar::String,
        WireScalar::BigInt,
        WireScalar::Counter,
        WireScalar::Varint,
        WireScalar::Decimal,
        WireScalar::Ascii,
        WireScalar::Uuid,
        WireScalar::TimeUuid,
        WireScalar::Inet,
        WireScalar::Blob,
        WireScalar::Timestamp,
        WireScalar::Time,
    ];

    /// GraphQL type name.
    pub fn name(self) -> &'static str {
        match self {
            WireScalar::Int => "Int",
            WireScalar::Float => "Float",
            WireScalar::Boolean => "Boolean",
            WireScalar::String => "String",
            WireScalar::BigInt => "BigInt",
            WireScalar::Counter => "Counter",
            WireScalar::Varint => "Varint",
            WireScalar::Decimal => "Decimal",
            WireScalar::Ascii => "Ascii",
            WireScalar::Uuid => "Uuid",
            WireScalar::TimeUuid => "TimeUuid",
            WireScalar::Inet => "Inet",
            WireScalar::Blob => "Blob",
            WireScalar::Timestamp => "Timestamp",
            WireScalar::Time => "Time",
        }
    }

    /// Scalars that GraphQL provides; the rest are registered as custom scalars.
    pub fn is_builtin(self) -> bool {
        matches!(
            self,
            WireScalar::Int | WireScalar::Float | WireScalar::Boolean | WireScalar::String
        )
    }

    pub fn description(self) -> &'static str {
        match self {
            WireScalar::Int => "32-bit signed integer",
            WireScalar::Float => "Double precision floating point",
            WireScalar::Boolean => "true or false",
            WireScalar::String => "UTF-8 text",
            WireScalar::BigInt => "64-bit signed integer as a decimal string",
            WireScalar::Counter => "64-bit counter value as a decimal string",
            WireScalar::Varint => "Arbitrary-precision integer as a decimal string",
            WireScalar::Decimal => "Arbitrary-precision decimal as text",
            WireScalar::Ascii => "US-ASCII text",
            WireScalar::Uuid => "UUID in canonical dashed form",
            WireScalar::TimeUuid => "Version 1 (time-based) UUID in canonical dashed form",
            WireScalar::Inet => "IPv4 or IPv6 address",
            WireScalar::Blob => "Binary data as base64",
            WireScalar::Timestamp => "RFC 3339 date-time with millisecond precision",
            WireScalar::Time => "Time of day as HH:MM:SS[.nnnnnnnnn]",
        }
    }
}

/// Shape of a column's wire value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WireType {
    Scalar(WireScalar),
    List(Box<WireType>),
    /// One `{key, value}` element of an encoded map
    Entry(Box<WireType>, Box<WireType>),
}

impl WireType {
    /// Name fragment used when generating type names (`ListString`,
    /// `EntryStringKeyIntValue`).
    pub fn type_name(&self) -> String {
        match self {
            WireType::Scalar(s) => s.name().to_string(),
            WireType::List(inner) => format!("List{}", inner.type_name()),
            WireType::Entry(k, v) => format!("Entry{}Key{}Value", k.type_name(), v.type_name()),
        }
    }

    /// Entry types reachable from this type, innermost first.
    pub fn entries(&self) -> Vec<(&WireType, &WireType)> {
        let mut out = Vec::new();
        self.collect_entries(&mut out);
        out
    }

    fn collect_entries<'a>(&'a self, out: &mut Vec<(&'a WireType, &'a WireType)>) {
        match self {
            WireType::Scalar(_) => {}
            WireType::List(inner) => inner.collect_entries(out),
            WireType::Entry(k, v) => {
                k.collect_entries(out);
                v.collect_entries(out);
                out.push((k, v));
            }
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireType::Scalar(s) => f.write_str(s.name()),
            WireType::List(inner) => write!(f, "[{}]", inner),
            WireType::Entry(k, v) => write!(f, "{{key: {}, value: {}}}", k, v),
        }
    }
}
