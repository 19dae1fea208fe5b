use std::fmt::Display;

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

pub(crate) static ABSENT: Value = Value::Absent;

/// A scalar carried by a SOAP element.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
}

impl PrimitiveValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Bool(_) => "boolean",
            Self::DateTime(_) => "dateTime",
            Self::Date(_) => "date",
        }
    }
}

/// Canonical XML Schema lexical form.
impl Display for PrimitiveValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) if v.is_nan() => write!(f, "NaN"),
            Self::Float(v) if v.is_infinite() => {
                write!(f, "{}", if *v > 0.0 { "INF" } else { "-INF" })
            }
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::DateTime(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for PrimitiveValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for PrimitiveValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for PrimitiveValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for PrimitiveValue {
    fn from(i: i32) -> Self {
        Self::Int(i.into())
    }
}

impl From<u32> for PrimitiveValue {
    fn from(i: u32) -> Self {
        Self::Int(i.into())
    }
}

impl From<f64> for PrimitiveValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for PrimitiveValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<FixedOffset>> for PrimitiveValue {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<NaiveDate> for PrimitiveValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

/// Ordered name → value mapping. Keys are unique; insertion order is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces `key`, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = Self::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// The native value tree exchanged with callers and handlers.
///
/// `Absent` (the element was not there) and `Nil` (`xsi:nil="true"`) are kept
/// apart so that neither ever turns into a zero value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Absent,
    Nil,
    Primitive(PrimitiveValue),
    Record(Record),
    List(Vec<Value>),
}

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Nil => "nil",
            Self::Primitive(p) => p.kind(),
            Self::Record(_) => "record",
            Self::List(_) => "list",
        }
    }

    pub fn as_primitive(&self) -> Option<&PrimitiveValue> {
        match self {
            Self::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Primitive(PrimitiveValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Primitive(PrimitiveValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Primitive(PrimitiveValue::Float(v)) => Some(*v),
            Self::Primitive(PrimitiveValue::Int(i)) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Primitive(PrimitiveValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Field `key` of a record; `Absent` for missing keys and non-records.
    pub fn get(&self, key: &str) -> &Self {
        self.as_record()
            .and_then(|record| record.get(key))
            .unwrap_or(&ABSENT)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => Ok(()),
            Self::Nil => write!(f, "nil"),
            Self::Primitive(p) => p.fmt(f),
            Self::Record(record) => {
                write!(f, "{{")?;
                for (i, (key, value)) in record.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

macro_rules! value_from_primitive {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Primitive(v.into())
                }
            }
        )*
    };
}

value_from_primitive!(&str, String, i64, i32, u32, f64, bool, DateTime<FixedOffset>, NaiveDate);

impl From<PrimitiveValue> for Value {
    fn from(p: PrimitiveValue) -> Self {
        Self::Primitive(p)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Self::Record(r)
    }
}

impl From<Vec<Self>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

/// JSON-friendly form: records become maps (absent entries are skipped), `Nil`
/// and `Absent` become `null`, dates use their lexical form.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Absent | Self::Nil => serializer.serialize_none(),
            Self::Primitive(p) => p.serialize(serializer),
            Self::Record(record) => {
                let present: Vec<_> = record.iter().filter(|(_, v)| !v.is_absent()).collect();
                let mut map = serializer.serialize_map(Some(present.len()))?;
                for (key, value) in present {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl Serialize for PrimitiveValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::String(s) => serializer.serialize_str(s),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::DateTime(dt) => dt.serialize(serializer),
            Self::Float(_) | Self::Date(_) => serializer.collect_str(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_order_and_replaces_in_place() {
        let mut record = Record::new().with("b", 1).with("a", 2);
        record.insert("b", 3);

        let keys: Vec<_> = record.keys().collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(record.get("b"), Some(&Value::from(3)));
    }

    #[test]
    fn test_get_on_missing_key_is_absent() {
        let value = Value::from(Record::new().with("x", true));
        assert_eq!(value.get("x").as_bool(), Some(true));
        assert!(value.get("y").is_absent());
        assert!(Value::from(5).get("x").is_absent());
    }

    #[test]
    fn test_lexical_forms() {
        assert_eq!(PrimitiveValue::Float(10.55).to_string(), "10.55");
        assert_eq!(PrimitiveValue::Float(f64::INFINITY).to_string(), "INF");
        assert_eq!(PrimitiveValue::Float(f64::NEG_INFINITY).to_string(), "-INF");
        assert_eq!(PrimitiveValue::Float(f64::NAN).to_string(), "NaN");
        assert_eq!(PrimitiveValue::Bool(false).to_string(), "false");

        let dt = DateTime::parse_from_rfc3339("2024-03-01T10:20:30+00:00").unwrap();
        assert_eq!(PrimitiveValue::DateTime(dt).to_string(), "2024-03-01T10:20:30Z");
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(PrimitiveValue::Date(date).to_string(), "2024-03-01");
    }

    #[test]
    fn test_serialize_skips_absent_entries() {
        let value = Value::from(
            Record::new()
                .with("z", true)
                .with("missing", Value::Absent)
                .with("nothing", Value::Nil)
                .with("items", vec![Value::from(1), Value::from("two")]),
        );

        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"z":true,"nothing":null,"items":[1,"two"]}"#);
    }
}
