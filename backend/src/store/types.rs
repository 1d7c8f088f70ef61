//! Native column types of the store.
//!
//! One exhaustive enum; every consumer (codec, type graph, compiler, memory
//! store) matches on it without a default arm, so adding a type is a compile
//! error everywhere it needs handling.

use std::fmt;
use std::str::FromStr;

/// A column type in the store's own type system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NativeType {
    TinyInt,
    SmallInt,
    Int,
    /// 64-bit integer, exposed as a decimal string on the wire
    BigInt,
    Float,
    Double,
    Boolean,
    Text,
    Ascii,
    Uuid,
    TimeUuid,
    Inet,
    Blob,
    Decimal,
    Varint,
    /// Milliseconds since the epoch
    Timestamp,
    /// Nanoseconds since midnight
    Time,
    Counter,
    List(Box<NativeType>),
    Set(Box<NativeType>),
    Map(Box<NativeType>, Box<NativeType>),
}

/// Raised when a type string names something the gateway cannot expose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownType(pub String);

impl fmt::Display for UnknownType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported type '{}'", self.0)
    }
}

impl std::error::Error for UnknownType {}

impl NativeType {
    pub fn list(element: NativeType) -> Self {
        NativeType::List(Box::new(element))
    }

    pub fn set(element: NativeType) -> Self {
        NativeType::Set(Box::new(element))
    }

    pub fn map(key: NativeType, value: NativeType) -> Self {
        NativeType::Map(Box::new(key), Box::new(value))
    }

    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            NativeType::List(_) | NativeType::Set(_) | NativeType::Map(_, _)
        )
    }

    /// CQL keyword of the outermost type (`list` for `list<int>`).
    pub fn tag(&self) -> &'static str {
        match self {
            NativeType::TinyInt => "tinyint",
            NativeType::SmallInt => "smallint",
            NativeType::Int => "int",
            NativeType::BigInt => "bigint",
            NativeType::Float => "float",
            NativeType::Double => "double",
            NativeType::Boolean => "boolean",
            NativeType::Text => "text",
            NativeType::Ascii => "ascii",
            NativeType::Uuid => "uuid",
            NativeType::TimeUuid => "timeuuid",
            NativeType::Inet => "inet",
            NativeType::Blob => "blob",
            NativeType::Decimal => "decimal",
            NativeType::Varint => "varint",
            NativeType::Timestamp => "timestamp",
            NativeType::Time => "time",
            NativeType::Counter => "counter",
            NativeType::List(_) => "list",
            NativeType::Set(_) => "set",
            NativeType::Map(_, _) => "map",
        }
    }

    fn leaf_from_tag(tag: &str) -> Option<Self> {
        let ty = match tag {
            "tinyint" => NativeType::TinyInt,
            "smallint" => NativeType::SmallInt,
            "int" => NativeType::Int,
            "bigint" => NativeType::BigInt,
            "float" => NativeType::Float,
            "double" => NativeType::Double,
            "boolean" => NativeType::Boolean,
            "text" | "varchar" => NativeType::Text,
            "ascii" => NativeType::Ascii,
            "uuid" => NativeType::Uuid,
            "timeuuid" => NativeType::TimeUuid,
            "inet" => NativeType::Inet,
            "blob" => NativeType::Blob,
            "decimal" => NativeType::Decimal,
            "varint" => NativeType::Varint,
            "timestamp" => NativeType::Timestamp,
            "time" => NativeType::Time,
            "counter" => NativeType::Counter,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::List(e) => write!(f, "list<{}>", e),
            NativeType::Set(e) => write!(f, "set<{}>", e),
            NativeType::Map(k, v) => write!(f, "map<{}, {}>", k, v),
            leaf => f.write_str(leaf.tag()),
        }
    }
}

impl FromStr for NativeType {
    type Err = UnknownType;

    /// Parse CQL type text such as `map<text, frozen<list<int>>>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = TypeParser {
            src: s,
            rest: s.trim(),
        };
        let ty = parser.parse()?;
        if !parser.rest.trim().is_empty() {
            return Err(UnknownType(s.to_string()));
        }
        Ok(ty)
    }
}

struct TypeParser<'a> {
    src: &'a str,
    rest: &'a str,
}

impl<'a> TypeParser<'a> {
    fn err(&self) -> UnknownType {
        UnknownType(self.src.trim().to_string())
    }

    fn word(&mut self) -> &'a str {
        self.rest = self.rest.trim_start();
        let end = self
            .rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(self.rest.len());
        let (word, rest) = self.rest.split_at(end);
        self.rest = rest;
        word
    }

    fn expect(&mut self, c: char) -> Result<(), UnknownType> {
        self.rest = self.rest.trim_start();
        match self.rest.strip_prefix(c) {
            Some(rest) => {
                self.rest = rest;
                Ok(())
            }
            None => Err(self.err()),
        }
    }

    fn parse(&mut self) -> Result<NativeType, UnknownType> {
        let word = self.word().to_ascii_lowercase();
        match word.as_str() {
            "frozen" => {
                self.expect('<')?;
                let inner = self.parse()?;
                self.expect('>')?;
                Ok(inner)
            }
            "list" | "set" => {
                self.expect('<')?;
                let element = self.parse()?;
                self.expect('>')?;
                Ok(if word == "list" {
                    NativeType::list(element)
                } else {
                    NativeType::set(element)
                })
            }
            "map" => {
                self.expect('<')?;
                let key = self.parse()?;
                self.expect(',')?;
                let value = self.parse()?;
                self.expect('>')?;
                Ok(NativeType::map(key, value))
            }
            leaf => NativeType::leaf_from_tag(leaf).ok_or_else(|| UnknownType(leaf.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_leaf_types() {
        assert_eq!("int".parse::<NativeType>().unwrap(), NativeType::Int);
        assert_eq!("VARCHAR".parse::<NativeType>().unwrap(), NativeType::Text);
        assert_eq!(" timeuuid ".parse::<NativeType>().unwrap(), NativeType::TimeUuid);
    }

    #[test]
    fn test_parse_nested_collections() {
        let ty: NativeType = "map<text, frozen<list<int>>>".parse().unwrap();
        assert_eq!(
            ty,
            NativeType::map(NativeType::Text, NativeType::list(NativeType::Int))
        );
        assert_eq!(ty.to_string(), "map<text, list<int>>");
    }

    #[test]
    fn test_parse_rejects_unknown_tags() {
        assert_eq!(
            "duration".parse::<NativeType>(),
            Err(UnknownType("duration".to_string()))
        );
        assert!("list<int".parse::<NativeType>().is_err());
        assert!("map<int>".parse::<NativeType>().is_err());
        assert!("int extra".parse::<NativeType>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for text in ["set<uuid>", "list<map<int, blob>>", "decimal", "counter"] {
            let ty: NativeType = text.parse().unwrap();
            assert_eq!(ty.to_string(), text);
        }
    }
}
