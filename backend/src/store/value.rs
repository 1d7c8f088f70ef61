//! Values as the store holds them.

use std::cmp::Ordering;
use std::net::IpAddr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveTime, Utc};
use uuid::Uuid;

use super::types::NativeType;

/// A value in the store's type system. Collections keep their elements in
/// the order the store returned them; maps are ordered `(key, value)` entries
/// because keys need not be strings.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageValue {
    Null,
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Counter(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Text(String),
    Ascii(String),
    Uuid(Uuid),
    TimeUuid(Uuid),
    Inet(IpAddr),
    Blob(Vec<u8>),
    Decimal(BigDecimal),
    Varint(num_bigint::BigInt),
    Timestamp(DateTime<Utc>),
    Time(NaiveTime),
    List(Vec<StorageValue>),
    Set(Vec<StorageValue>),
    Map(Vec<(StorageValue, StorageValue)>),
}

impl StorageValue {
    pub fn is_null(&self) -> bool {
        matches!(self, StorageValue::Null)
    }

    /// Whether this value can be stored in a column of `ty`.
    pub fn conforms_to(&self, ty: &NativeType) -> bool {
        match (self, ty) {
            (StorageValue::Null, _) => true,
            (StorageValue::TinyInt(_), NativeType::TinyInt)
            | (StorageValue::SmallInt(_), NativeType::SmallInt)
            | (StorageValue::Int(_), NativeType::Int)
            | (StorageValue::BigInt(_), NativeType::BigInt)
            | (StorageValue::Counter(_), NativeType::Counter)
            | (StorageValue::Float(_), NativeType::Float)
            | (StorageValue::Double(_), NativeType::Double)
            | (StorageValue::Boolean(_), NativeType::Boolean)
            | (StorageValue::Text(_), NativeType::Text)
            | (StorageValue::Ascii(_), NativeType::Ascii)
            | (StorageValue::Uuid(_), NativeType::Uuid)
            | (StorageValue::TimeUuid(_), NativeType::TimeUuid)
            | (StorageValue::Inet(_), NativeType::Inet)
            | (StorageValue::Blob(_), NativeType::Blob)
            | (StorageValue::Decimal(_), NativeType::Decimal)
            | (StorageValue::Varint(_), NativeType::Varint)
            | (StorageValue::Timestamp(_), NativeType::Timestamp)
            | (StorageValue::Time(_), NativeType::Time) => true,
            (StorageValue::List(items), NativeType::List(e)) => {
                items.iter().all(|i| i.conforms_to(e))
            }
            (StorageValue::Set(items), NativeType::Set(e)) => items.iter().all(|i| i.conforms_to(e)),
            (StorageValue::Map(entries), NativeType::Map(k, v)) => entries
                .iter()
                .all(|(key, value)| key.conforms_to(k) && value.conforms_to(v)),
            _ => false,
        }
    }

    /// Order two values of the same native type. `None` when the values are
    /// of different kinds or either is null.
    pub fn compare(&self, other: &StorageValue) -> Option<Ordering> {
        use StorageValue::*;
        match (self, other) {
            (TinyInt(a), TinyInt(b)) => Some(a.cmp(b)),
            (SmallInt(a), SmallInt(b)) => Some(a.cmp(b)),
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (BigInt(a), BigInt(b)) | (Counter(a), Counter(b)) => Some(a.cmp(b)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Double(a), Double(b)) => a.partial_cmp(b),
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (Text(a), Text(b)) | (Ascii(a), Ascii(b)) => Some(a.cmp(b)),
            (Uuid(a), Uuid(b)) => Some(a.cmp(b)),
            (TimeUuid(a), TimeUuid(b)) => Some(compare_timeuuid(a, b)),
            (Inet(a), Inet(b)) => Some(a.cmp(b)),
            (Blob(a), Blob(b)) => Some(a.cmp(b)),
            (Decimal(a), Decimal(b)) => Some(a.cmp(b)),
            (Varint(a), Varint(b)) => Some(a.cmp(b)),
            (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),
            (Time(a), Time(b)) => Some(a.cmp(b)),
            (List(a), List(b)) | (Set(a), Set(b)) => compare_sequences(a.iter(), b.iter()),
            (Map(a), Map(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    match ka.compare(kb)? {
                        Ordering::Equal => {}
                        other => return Some(other),
                    }
                    match va.compare(vb)? {
                        Ordering::Equal => {}
                        other => return Some(other),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }
}

fn compare_sequences<'a>(
    a: impl Iterator<Item = &'a StorageValue>,
    b: impl Iterator<Item = &'a StorageValue>,
) -> Option<Ordering> {
    let a: Vec<_> = a.collect();
    let b: Vec<_> = b.collect();
    for (x, y) in a.iter().zip(b.iter()) {
        match x.compare(y)? {
            Ordering::Equal => {}
            other => return Some(other),
        }
    }
    Some(a.len().cmp(&b.len()))
}

/// Time-based UUIDs sort by their embedded timestamp first.
fn compare_timeuuid(a: &Uuid, b: &Uuid) -> Ordering {
    timeuuid_ticks(a)
        .cmp(&timeuuid_ticks(b))
        .then_with(|| a.cmp(b))
}

/// 60-bit timestamp of a version 1 UUID (time_hi | time_mid | time_low).
fn timeuuid_ticks(u: &Uuid) -> u64 {
    let b = u.as_bytes();
    let low = u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64;
    let mid = u16::from_be_bytes([b[4], b[5]]) as u64;
    let hi = (u16::from_be_bytes([b[6], b[7]]) & 0x0fff) as u64;
    (hi << 48) | (mid << 32) | low
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_same_kind() {
        assert_eq!(
            StorageValue::Int(1).compare(&StorageValue::Int(2)),
            Some(Ordering::Less)
        );
        assert_eq!(
            StorageValue::Text("b".into()).compare(&StorageValue::Text("a".into())),
            Some(Ordering::Greater)
        );
        assert_eq!(StorageValue::Int(1).compare(&StorageValue::BigInt(1)), None);
        assert_eq!(StorageValue::Null.compare(&StorageValue::Null), None);
    }

    #[test]
    fn test_compare_collections() {
        let a = StorageValue::List(vec![StorageValue::Int(1), StorageValue::Int(2)]);
        let b = StorageValue::List(vec![StorageValue::Int(1)]);
        assert_eq!(a.compare(&b), Some(Ordering::Greater));
    }

    #[test]
    fn test_conforms_to_nested_types() {
        let value = StorageValue::Map(vec![(
            StorageValue::Text("k".into()),
            StorageValue::List(vec![StorageValue::Int(3)]),
        )]);
        assert!(value.conforms_to(&NativeType::map(
            NativeType::Text,
            NativeType::list(NativeType::Int)
        )));
        assert!(!value.conforms_to(&NativeType::map(NativeType::Text, NativeType::Int)));
        assert!(StorageValue::Null.conforms_to(&NativeType::Blob));
    }
}
