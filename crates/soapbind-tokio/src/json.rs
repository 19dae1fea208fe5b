//! JSON on the command line, soapbind values in the engine.

use soapbind_core::{PrimitiveValue, Record, Value};

/// Converts JSON to a value tree. `null` becomes nil; numbers that fit `i64` stay integers.
pub fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::from(b),
        serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Value::from(i),
            (None, Some(f)) => Value::from(f),
            (None, None) => Value::Primitive(PrimitiveValue::String(n.to_string())),
        },
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(entries) => {
            let mut record = Record::new();
            for (key, value) in entries {
                record.insert(key, from_json(value));
            }
            Value::Record(record)
        }
    }
}

pub fn parse(text: &str) -> anyhow::Result<Value> {
    Ok(from_json(serde_json::from_str(text)?))
}

pub fn to_json(value: &Value) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_becomes_record() {
        let value = parse(r#"{"xElement": 100, "yElement": 10.55, "note": null, "tags": ["a", "b"]}"#)
            .unwrap();

        assert_eq!(value.get("xElement"), &Value::from(100));
        assert_eq!(value.get("yElement").as_f64(), Some(10.55));
        assert!(value.get("note").is_nil());
        assert_eq!(
            value.get("tags"),
            &Value::List(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn test_result_rendering() {
        assert_eq!(to_json(&Value::from(true)).unwrap(), "true");

        let record = Value::from(Record::new().with("z", false).with("gone", Value::Absent));
        assert_eq!(to_json(&record).unwrap(), "{\n  \"z\": false\n}");
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(parse("{x: 1}").is_err());
    }
}
