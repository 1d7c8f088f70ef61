//! Conversion between storage values and wire values.
//!
//! `encode` is total: any storage value has a wire form, and null encodes to
//! null whatever the column type. `decode` is checked against the column's
//! native type and reports the offending field path on failure.

mod wire;

pub use wire::{WireScalar, WireType, WireValue};

use std::net::IpAddr;
use std::num::IntErrorKind;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveTime, SecondsFormat, Timelike, Utc};
use num_bigint::BigInt;
use serde_json::Number;
use uuid::Uuid;

use crate::error::CodecError;
use crate::store::{NativeType, StorageValue};

/// Wire type used to expose a column of `ty`.
pub fn wire_type(ty: &NativeType) -> WireType {
    match ty {
        NativeType::TinyInt | NativeType::SmallInt | NativeType::Int => {
            WireType::Scalar(WireScalar::Int)
        }
        NativeType::Float | NativeType::Double => WireType::Scalar(WireScalar::Float),
        NativeType::Boolean => WireType::Scalar(WireScalar::Boolean),
        NativeType::Text => WireType::Scalar(WireScalar::String),
        NativeType::BigInt => WireType::Scalar(WireScalar::BigInt),
        NativeType::Counter => WireType::Scalar(WireScalar::Counter),
        NativeType::Varint => WireType::Scalar(WireScalar::Varint),
        NativeType::Decimal => WireType::Scalar(WireScalar::Decimal),
        NativeType::Ascii => WireType::Scalar(WireScalar::Ascii),
        NativeType::Uuid => WireType::Scalar(WireScalar::Uuid),
        NativeType::TimeUuid => WireType::Scalar(WireScalar::TimeUuid),
        NativeType::Inet => WireType::Scalar(WireScalar::Inet),
        NativeType::Blob => WireType::Scalar(WireScalar::Blob),
        NativeType::Timestamp => WireType::Scalar(WireScalar::Timestamp),
        NativeType::Time => WireType::Scalar(WireScalar::Time),
        NativeType::List(e) | NativeType::Set(e) => WireType::List(Box::new(wire_type(e))),
        NativeType::Map(k, v) => WireType::List(Box::new(WireType::Entry(
            Box::new(wire_type(k)),
            Box::new(wire_type(v)),
        ))),
    }
}

/// Encode a storage value. Storage values carry their own type, so the
/// encoding follows the value.
pub fn encode(value: &StorageValue) -> WireValue {
    match value {
        StorageValue::Null => WireValue::Null,
        StorageValue::TinyInt(v) => WireValue::Number((*v).into()),
        StorageValue::SmallInt(v) => WireValue::Number((*v).into()),
        StorageValue::Int(v) => WireValue::Number((*v).into()),
        StorageValue::BigInt(v) | StorageValue::Counter(v) => WireValue::String(v.to_string()),
        StorageValue::Varint(v) => WireValue::String(v.to_string()),
        StorageValue::Float(v) => float(*v as f64),
        StorageValue::Double(v) => float(*v),
        StorageValue::Boolean(v) => WireValue::Bool(*v),
        StorageValue::Text(v) | StorageValue::Ascii(v) => WireValue::String(v.clone()),
        StorageValue::Uuid(v) | StorageValue::TimeUuid(v) => {
            WireValue::String(v.hyphenated().to_string())
        }
        StorageValue::Inet(v) => WireValue::String(v.to_string()),
        StorageValue::Blob(v) => WireValue::String(STANDARD.encode(v)),
        StorageValue::Decimal(v) => WireValue::String(v.to_string()),
        StorageValue::Timestamp(v) => {
            WireValue::String(v.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        StorageValue::Time(v) => WireValue::String(format_time(v)),
        StorageValue::List(items) | StorageValue::Set(items) => {
            WireValue::List(items.iter().map(encode).collect())
        }
        StorageValue::Map(entries) => WireValue::List(
            entries
                .iter()
                .map(|(k, v)| WireValue::pair(encode(k), encode(v)))
                .collect(),
        ),
    }
}

// JSON has no NaN or infinities, so those travel as their names.
fn float(v: f64) -> WireValue {
    if v.is_nan() {
        WireValue::String("NaN".to_string())
    } else if v.is_infinite() {
        let name = if v > 0.0 { "Infinity" } else { "-Infinity" };
        WireValue::String(name.to_string())
    } else {
        Number::from_f64(v).map_or(WireValue::Null, WireValue::Number)
    }
}

fn format_time(t: &NaiveTime) -> String {
    let base = t.format("%H:%M:%S").to_string();
    match t.nanosecond() {
        0 => base,
        nanos => format!("{}.{:09}", base, nanos),
    }
}

/// Decode a wire value into the storage representation of `ty`.
pub fn decode(ty: &NativeType, value: &WireValue) -> Result<StorageValue, CodecError> {
    if value.is_null() {
        return Ok(StorageValue::Null);
    }
    let decoded = match ty {
        NativeType::TinyInt => StorageValue::TinyInt(narrow(ty, integer(ty, value)?)?),
        NativeType::SmallInt => StorageValue::SmallInt(narrow(ty, integer(ty, value)?)?),
        NativeType::Int => StorageValue::Int(narrow(ty, integer(ty, value)?)?),
        NativeType::BigInt => StorageValue::BigInt(wide_integer(ty, value)?),
        NativeType::Counter => StorageValue::Counter(wide_integer(ty, value)?),
        NativeType::Varint => StorageValue::Varint(varint(ty, value)?),
        NativeType::Float => {
            let v = number(ty, value)?;
            if v.is_finite() && v.abs() > f32::MAX as f64 {
                return Err(CodecError::out_of_range(ty));
            }
            StorageValue::Float(v as f32)
        }
        NativeType::Double => StorageValue::Double(number(ty, value)?),
        NativeType::Boolean => match value {
            WireValue::Bool(b) => StorageValue::Boolean(*b),
            other => return Err(mismatch(ty, "boolean", other)),
        },
        NativeType::Text => StorageValue::Text(string(ty, value)?.to_string()),
        NativeType::Ascii => {
            let s = string(ty, value)?;
            if !s.is_ascii() {
                return Err(CodecError::malformed(ty, "contains non-ASCII characters"));
            }
            StorageValue::Ascii(s.to_string())
        }
        NativeType::Uuid => StorageValue::Uuid(parse_uuid(ty, value)?),
        NativeType::TimeUuid => {
            let id = parse_uuid(ty, value)?;
            if id.get_version_num() != 1 {
                return Err(CodecError::malformed(
                    ty,
                    format!("expected a version 1 UUID, got version {}", id.get_version_num()),
                ));
            }
            StorageValue::TimeUuid(id)
        }
        NativeType::Inet => {
            let s = string(ty, value)?;
            let addr = IpAddr::from_str(s.trim())
                .map_err(|e| CodecError::malformed(ty, e.to_string()))?;
            StorageValue::Inet(addr)
        }
        NativeType::Blob => {
            let bytes = STANDARD
                .decode(string(ty, value)?)
                .map_err(|e| CodecError::malformed(ty, e.to_string()))?;
            StorageValue::Blob(bytes)
        }
        NativeType::Decimal => StorageValue::Decimal(decimal(ty, value)?),
        NativeType::Timestamp => StorageValue::Timestamp(timestamp(ty, value)?),
        NativeType::Time => StorageValue::Time(time(ty, string(ty, value)?)?),
        NativeType::List(element) => StorageValue::List(elements(element, value, ty)?),
        NativeType::Set(element) => StorageValue::Set(elements(element, value, ty)?),
        NativeType::Map(k, v) => {
            let WireValue::List(items) = value else {
                return Err(mismatch(ty, "list of key/value entries", value));
            };
            let mut entries = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let WireValue::Pair(key, val) = item else {
                    return Err(mismatch(ty, "key/value entry", item).within(i));
                };
                let key = decode(k, key).map_err(|e| e.within("key").within(i))?;
                let val = decode(v, val).map_err(|e| e.within("value").within(i))?;
                entries.push((key, val));
            }
            StorageValue::Map(entries)
        }
    };
    Ok(decoded)
}

fn elements(
    element: &NativeType,
    value: &WireValue,
    ty: &NativeType,
) -> Result<Vec<StorageValue>, CodecError> {
    let WireValue::List(items) = value else {
        return Err(mismatch(ty, "list", value));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| decode(element, item).map_err(|e| e.within(i)))
        .collect()
}

fn mismatch(ty: &NativeType, expected: &str, got: &WireValue) -> CodecError {
    CodecError::malformed(ty, format!("expected {}, got {}", expected, got.kind()))
}

fn string<'a>(ty: &NativeType, value: &'a WireValue) -> Result<&'a str, CodecError> {
    match value {
        WireValue::String(s) => Ok(s),
        other => Err(mismatch(ty, "string", other)),
    }
}

fn number(ty: &NativeType, value: &WireValue) -> Result<f64, CodecError> {
    match value {
        WireValue::Number(n) => n
            .as_f64()
            .ok_or_else(|| CodecError::malformed(ty, "not a finite number")),
        WireValue::String(s) => match s.trim() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => Err(CodecError::malformed(
                ty,
                format!("'{}' is not NaN, Infinity or -Infinity", other),
            )),
        },
        other => Err(mismatch(ty, "number", other)),
    }
}

fn integer(ty: &NativeType, value: &WireValue) -> Result<i64, CodecError> {
    match value {
        WireValue::Number(n) => number_to_i64(ty, n),
        other => Err(mismatch(ty, "integer", other)),
    }
}

fn number_to_i64(ty: &NativeType, n: &Number) -> Result<i64, CodecError> {
    if let Some(v) = n.as_i64() {
        Ok(v)
    } else if n.as_u64().is_some() {
        Err(CodecError::out_of_range(ty))
    } else {
        Err(CodecError::malformed(ty, format!("{} is not an integer", n)))
    }
}

fn narrow<T: TryFrom<i64>>(ty: &NativeType, v: i64) -> Result<T, CodecError> {
    T::try_from(v).map_err(|_| CodecError::out_of_range(ty))
}

/// Text of an integer that travels as a decimal string. Plain integral
/// numbers are accepted too.
fn integer_text(ty: &NativeType, value: &WireValue) -> Result<String, CodecError> {
    match value {
        WireValue::String(s) => Ok(s.trim().to_string()),
        WireValue::Number(n) if n.as_i64().is_some() || n.as_u64().is_some() => Ok(n.to_string()),
        WireValue::Number(n) => Err(CodecError::malformed(ty, format!("{} is not an integer", n))),
        other => Err(mismatch(ty, "integer string", other)),
    }
}

fn wide_integer<T>(ty: &NativeType, value: &WireValue) -> Result<T, CodecError>
where
    T: FromStr<Err = std::num::ParseIntError>,
{
    let text = integer_text(ty, value)?;
    text.parse::<T>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => CodecError::out_of_range(ty),
        _ => CodecError::malformed(ty, format!("'{}' is not an integer", text)),
    })
}

/// Arbitrary precision, so there is no range to check; only `[+-]digits`.
fn varint(ty: &NativeType, value: &WireValue) -> Result<BigInt, CodecError> {
    let text = integer_text(ty, value)?;
    let digits = text.strip_prefix(['+', '-']).unwrap_or(&text);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(CodecError::malformed(ty, format!("'{}' is not an integer", text)));
    }
    BigInt::from_str(&text).map_err(|e| CodecError::malformed(ty, e.to_string()))
}

fn parse_uuid(ty: &NativeType, value: &WireValue) -> Result<Uuid, CodecError> {
    Uuid::parse_str(string(ty, value)?.trim()).map_err(|e| CodecError::malformed(ty, e.to_string()))
}

fn decimal(ty: &NativeType, value: &WireValue) -> Result<BigDecimal, CodecError> {
    let text = match value {
        WireValue::String(s) => s.trim().to_string(),
        WireValue::Number(n) => n.to_string(),
        other => return Err(mismatch(ty, "decimal string", other)),
    };
    if !looks_numeric(&text) {
        return Err(CodecError::malformed(ty, format!("'{}' is not a decimal number", text)));
    }
    // Only an exponent too large for the scale can fail here.
    BigDecimal::from_str(&text).map_err(|_| CodecError::out_of_range(ty))
}

/// `[+-]digits[.digits][e[+-]digits]`
fn looks_numeric(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (mantissa, exponent) = match body.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (body, None),
    };
    let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    let mantissa_ok = !(int.is_empty() && frac.is_empty()) && digits(int) && digits(frac);
    let exponent_ok = exponent.is_none_or(|e| {
        let e = e.strip_prefix(['+', '-']).unwrap_or(e);
        !e.is_empty() && digits(e)
    });
    mantissa_ok && exponent_ok
}

fn timestamp(ty: &NativeType, value: &WireValue) -> Result<DateTime<Utc>, CodecError> {
    let millis = match value {
        WireValue::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .map_err(|e| CodecError::malformed(ty, e.to_string()))?
            .timestamp_millis(),
        WireValue::Number(n) => number_to_i64(ty, n)?,
        other => return Err(mismatch(ty, "RFC 3339 string", other)),
    };
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| CodecError::out_of_range(ty))
}

/// `HH:MM:SS` with an optional fraction of up to nine digits.
fn time(ty: &NativeType, text: &str) -> Result<NaiveTime, CodecError> {
    let bad = || CodecError::malformed(ty, format!("'{}' is not HH:MM:SS[.nnnnnnnnn]", text));
    let (clock, fraction) = match text.trim().split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (text.trim(), None),
    };
    let parts: Vec<&str> = clock.split(':').collect();
    let [h, m, s] = parts.as_slice() else {
        return Err(bad());
    };
    let field = |p: &str| -> Result<u32, CodecError> {
        if p.len() != 2 || !p.chars().all(|c| c.is_ascii_digit()) {
            return Err(bad());
        }
        p.parse().map_err(|_| bad())
    };
    let nanos = match fraction {
        None => 0,
        Some(f) if !f.is_empty() && f.len() <= 9 && f.chars().all(|c| c.is_ascii_digit()) => {
            format!("{:0<9}", f).parse::<u32>().map_err(|_| bad())?
        }
        Some(_) => return Err(bad()),
    };
    NaiveTime::from_hms_nano_opt(field(h)?, field(m)?, field(s)?, nanos)
        .ok_or_else(|| CodecError::out_of_range(ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn roundtrip(ty: NativeType, value: StorageValue) {
        let wire = encode(&value);
        let back = decode(&ty, &wire).unwrap_or_else(|e| panic!("{} failed: {}", ty, e));
        assert_eq!(back, value, "type {}", ty);
    }

    #[test]
    fn test_roundtrip_every_native_type() {
        let ts = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let cases = vec![
            (NativeType::TinyInt, StorageValue::TinyInt(-128)),
            (NativeType::SmallInt, StorageValue::SmallInt(32_000)),
            (NativeType::Int, StorageValue::Int(i32::MIN)),
            (NativeType::BigInt, StorageValue::BigInt(i64::MAX)),
            (NativeType::Counter, StorageValue::Counter(-42)),
            (NativeType::Varint, StorageValue::Varint(BigInt::from(i128::MAX))),
            (NativeType::Float, StorageValue::Float(1.5)),
            (NativeType::Double, StorageValue::Double(-0.1)),
            (NativeType::Boolean, StorageValue::Boolean(true)),
            (NativeType::Text, StorageValue::Text("héllo".into())),
            (NativeType::Ascii, StorageValue::Ascii("plain".into())),
            (
                NativeType::Uuid,
                StorageValue::Uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap()),
            ),
            (
                NativeType::TimeUuid,
                StorageValue::TimeUuid(
                    Uuid::parse_str("d2177dd0-eaa2-11de-a572-001b779c76e3").unwrap(),
                ),
            ),
            (NativeType::Inet, StorageValue::Inet("::1".parse().unwrap())),
            (NativeType::Blob, StorageValue::Blob(vec![0, 1, 254, 255])),
            (
                NativeType::Decimal,
                StorageValue::Decimal(BigDecimal::from_str("-12.3400").unwrap()),
            ),
            (NativeType::Timestamp, StorageValue::Timestamp(ts)),
            (
                NativeType::Time,
                StorageValue::Time(NaiveTime::from_hms_nano_opt(23, 59, 1, 5).unwrap()),
            ),
            (
                NativeType::list(NativeType::set(NativeType::Int)),
                StorageValue::List(vec![StorageValue::Set(vec![
                    StorageValue::Int(1),
                    StorageValue::Int(2),
                ])]),
            ),
            (
                NativeType::map(NativeType::Int, NativeType::list(NativeType::Text)),
                StorageValue::Map(vec![(
                    StorageValue::Int(7),
                    StorageValue::List(vec![StorageValue::Text("x".into())]),
                )]),
            ),
        ];
        for (ty, value) in cases {
            roundtrip(ty, value);
        }
    }

    #[test]
    fn test_null_is_null_for_every_type() {
        assert_eq!(encode(&StorageValue::Null), WireValue::Null);
        let ty = NativeType::map(NativeType::Text, NativeType::Int);
        assert_eq!(decode(&ty, &WireValue::Null).unwrap(), StorageValue::Null);
    }

    #[test]
    fn test_map_encodes_as_pair_list() {
        let value = StorageValue::Map(vec![(StorageValue::Int(1), StorageValue::Boolean(false))]);
        assert_eq!(
            encode(&value),
            WireValue::List(vec![WireValue::pair(
                WireValue::Number(1.into()),
                WireValue::Bool(false)
            )])
        );
    }

    #[test]
    fn test_scalar_formats() {
        let ts = Utc.timestamp_millis_opt(0).unwrap();
        assert_eq!(
            encode(&StorageValue::Timestamp(ts)),
            WireValue::String("1970-01-01T00:00:00.000Z".into())
        );
        let t = NaiveTime::from_hms_opt(7, 5, 0).unwrap();
        assert_eq!(encode(&StorageValue::Time(t)), WireValue::String("07:05:00".into()));
        assert_eq!(
            encode(&StorageValue::BigInt(9_007_199_254_740_993)),
            WireValue::String("9007199254740993".into())
        );
    }

    #[test]
    fn test_timestamp_decode_truncates_to_millis() {
        let wire = WireValue::String("2024-02-29T12:00:00.123456+02:00".into());
        let StorageValue::Timestamp(ts) = decode(&NativeType::Timestamp, &wire).unwrap() else {
            panic!("expected a timestamp");
        };
        assert_eq!(ts.timestamp_millis() % 1000, 123);
        assert_eq!(ts.to_rfc3339_opts(SecondsFormat::Millis, true), "2024-02-29T10:00:00.123Z");
    }

    #[test]
    fn test_integer_range() {
        let err = decode(&NativeType::TinyInt, &WireValue::Number(128.into())).unwrap_err();
        assert_matches!(err, CodecError::ValueOutOfRange { .. });
        let err = decode(&NativeType::BigInt, &WireValue::String("9223372036854775808".into()))
            .unwrap_err();
        assert_matches!(err, CodecError::ValueOutOfRange { .. });
        let err = decode(&NativeType::BigInt, &WireValue::String("12x".into())).unwrap_err();
        assert_matches!(err, CodecError::MalformedLiteral { .. });
        assert_eq!(
            decode(&NativeType::BigInt, &WireValue::Number(5.into())).unwrap(),
            StorageValue::BigInt(5)
        );
    }

    #[test]
    fn test_wire_kind_mismatch_is_malformed() {
        let err = decode(&NativeType::Int, &WireValue::String("1".into())).unwrap_err();
        assert_matches!(err, CodecError::MalformedLiteral { .. });
        let err = decode(&NativeType::Boolean, &WireValue::Number(1.into())).unwrap_err();
        assert_matches!(err, CodecError::MalformedLiteral { .. });
    }

    #[test]
    fn test_timeuuid_requires_version_one() {
        let v4 = WireValue::String("550e8400-e29b-41d4-a716-446655440000".into());
        assert_matches!(
            decode(&NativeType::TimeUuid, &v4),
            Err(CodecError::MalformedLiteral { .. })
        );
        assert!(decode(&NativeType::Uuid, &v4).is_ok());
    }

    #[test]
    fn test_ascii_and_blob_literals() {
        assert!(decode(&NativeType::Ascii, &WireValue::String("naïve".into())).is_err());
        assert!(decode(&NativeType::Blob, &WireValue::String("not base64!".into())).is_err());
        assert!(decode(&NativeType::Inet, &WireValue::String("300.1.1.1".into())).is_err());
    }

    #[test]
    fn test_time_literals() {
        assert_eq!(
            decode(&NativeType::Time, &WireValue::String("01:02:03.5".into())).unwrap(),
            StorageValue::Time(NaiveTime::from_hms_nano_opt(1, 2, 3, 500_000_000).unwrap())
        );
        for bad in ["1:02:03", "01:02", "01:02:03.", "01:02:03.1234567890"] {
            assert!(decode(&NativeType::Time, &WireValue::String(bad.into())).is_err(), "{}", bad);
        }
        assert_matches!(
            decode(&NativeType::Time, &WireValue::String("25:00:00".into())),
            Err(CodecError::ValueOutOfRange { .. })
        );
    }

    #[test]
    fn test_arbitrary_precision_numbers() {
        let forty_digits = "1".repeat(40);
        let varint = decode(&NativeType::Varint, &WireValue::String(forty_digits.clone())).unwrap();
        assert_eq!(encode(&varint), WireValue::String(forty_digits.clone()));
        roundtrip(
            NativeType::Varint,
            StorageValue::Varint(BigInt::from_str(&format!("-{}", forty_digits)).unwrap()),
        );

        let precise = "0.12345678901234567890123456789012345";
        let decimal = decode(&NativeType::Decimal, &WireValue::String(precise.into())).unwrap();
        assert_eq!(
            decimal,
            StorageValue::Decimal(BigDecimal::from_str(precise).unwrap())
        );
        roundtrip(NativeType::Decimal, decimal);
        roundtrip(
            NativeType::Decimal,
            StorageValue::Decimal(BigDecimal::from_str("1e40").unwrap()),
        );
    }

    #[test]
    fn test_decimal_and_varint_literals() {
        for bad in ["1.2.3", "1_000", "", "e5", "abc"] {
            assert_matches!(
                decode(&NativeType::Decimal, &WireValue::String(bad.into())),
                Err(CodecError::MalformedLiteral { .. }),
                "{}",
                bad
            );
        }
        for bad in ["1_000", "+", "1.5", "0x10"] {
            assert_matches!(
                decode(&NativeType::Varint, &WireValue::String(bad.into())),
                Err(CodecError::MalformedLiteral { .. }),
                "{}",
                bad
            );
        }
        assert_eq!(
            decode(&NativeType::Varint, &WireValue::Number(7.into())).unwrap(),
            StorageValue::Varint(BigInt::from(7))
        );
    }

    #[test]
    fn test_non_finite_floats_travel_as_names() {
        assert_eq!(
            encode(&StorageValue::Double(f64::NAN)),
            WireValue::String("NaN".into())
        );
        assert_eq!(
            encode(&StorageValue::Float(f32::NEG_INFINITY)),
            WireValue::String("-Infinity".into())
        );
        roundtrip(NativeType::Double, StorageValue::Double(f64::INFINITY));
        roundtrip(NativeType::Float, StorageValue::Float(f32::NEG_INFINITY));

        let back = decode(&NativeType::Double, &encode(&StorageValue::Double(f64::NAN))).unwrap();
        assert_matches!(back, StorageValue::Double(v) if v.is_nan());
        let back = decode(&NativeType::Float, &encode(&StorageValue::Float(f32::NAN))).unwrap();
        assert_matches!(back, StorageValue::Float(v) if v.is_nan());

        assert_matches!(
            decode(&NativeType::Double, &WireValue::String("inf".into())),
            Err(CodecError::MalformedLiteral { .. })
        );
    }

    #[test]
    fn test_nested_errors_carry_path() {
        let ty = NativeType::map(NativeType::Text, NativeType::list(NativeType::Int));
        let wire = WireValue::List(vec![
            WireValue::pair(WireValue::String("a".into()), WireValue::List(vec![])),
            WireValue::pair(
                WireValue::String("b".into()),
                WireValue::List(vec![
                    WireValue::Number(1.into()),
                    WireValue::Number(i64::MAX.into()),
                ]),
            ),
        ]);
        let err = decode(&ty, &wire).unwrap_err().within("tags");
        assert_eq!(err.path(), "tags.1.value.1");
    }

    #[test]
    fn test_wire_types() {
        assert_eq!(wire_type(&NativeType::SmallInt), WireType::Scalar(WireScalar::Int));
        assert_eq!(
            wire_type(&NativeType::set(NativeType::Text)).type_name(),
            "ListString"
        );
        assert_eq!(
            wire_type(&NativeType::map(NativeType::Uuid, NativeType::Counter)).type_name(),
            "ListEntryUuidKeyCounterValue"
        );
    }
}
