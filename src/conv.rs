//! Lenient conversion from a decoded parameter map into a typed argument.
//!
//! Parameter values arriving over the wire are mostly strings (query and
//! form fields), while operations declare real types. This module bridges
//! the two with a [`serde::Deserializer`] over [`serde_json::Value`] that:
//!
//! - matches struct fields case-insensitively,
//! - parses strings into numbers and booleans,
//! - splits a string on `~` when the target is a sequence (`"1~2~3"`),
//! - renders numbers/booleans as strings when the target is a string.
//!
//! JSON-sourced values (objects, arrays, numbers) pass through unchanged, so
//! the same conversion serves every request format.

use serde::de::{
    DeserializeOwned, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor,
};
use serde::Deserializer;
use serde_json::Value;

/// Conversion failure; the message names the offending value and target.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ConvError(String);

impl serde::de::Error for ConvError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        ConvError(msg.to_string())
    }
}

/// Convert a [`Value`] into any [`DeserializeOwned`] target with the lenient
/// rules above.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, ConvError> {
    T::deserialize(Lenient(value))
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

struct Lenient(Value);

impl Lenient {
    fn mismatch(&self, target: &str) -> ConvError {
        ConvError(format!("cannot convert {} to {}", type_of(&self.0), target))
    }

    fn visit_integer<'de, V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        match self.0 {
            Value::Number(ref n) => {
                if let Some(v) = n.as_i64() {
                    visitor.visit_i64(v)
                } else if let Some(v) = n.as_u64() {
                    visitor.visit_u64(v)
                } else if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 {
                        visitor.visit_i64(f as i64)
                    } else {
                        Err(self.mismatch("integer"))
                    }
                } else {
                    Err(self.mismatch("integer"))
                }
            }
            Value::String(ref s) => {
                let s = s.trim();
                if let Ok(v) = s.parse::<i64>() {
                    visitor.visit_i64(v)
                } else if let Ok(v) = s.parse::<u64>() {
                    visitor.visit_u64(v)
                } else {
                    Err(ConvError(format!("cannot parse '{s}' as an integer")))
                }
            }
            _ => Err(self.mismatch("integer")),
        }
    }

    fn visit_float<'de, V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        match self.0 {
            Value::Number(ref n) => match n.as_f64() {
                Some(v) => visitor.visit_f64(v),
                None => Err(self.mismatch("float")),
            },
            Value::String(ref s) => match s.trim().parse::<f64>() {
                Ok(v) => visitor.visit_f64(v),
                Err(_) => Err(ConvError(format!("cannot parse '{s}' as a float"))),
            },
            _ => Err(self.mismatch("float")),
        }
    }
}

struct SeqDeser(std::vec::IntoIter<Value>);

impl<'de> SeqAccess<'de> for SeqDeser {
    type Error = ConvError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, ConvError> {
        match self.0.next() {
            Some(v) => seed.deserialize(Lenient(v)).map(Some),
            None => Ok(None),
        }
    }
}

struct MapDeser {
    entries: std::vec::IntoIter<(String, Value)>,
    pending: Option<Value>,
}

impl<'de> MapAccess<'de> for MapDeser {
    type Error = ConvError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, ConvError> {
        match self.entries.next() {
            Some((k, v)) => {
                self.pending = Some(v);
                seed.deserialize(k.into_deserializer()).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, ConvError> {
        let value = self
            .pending
            .take()
            .ok_or_else(|| ConvError("value requested before key".to_string()))?;
        seed.deserialize(Lenient(value))
    }
}

impl<'de> Deserializer<'de> for Lenient {
    type Error = ConvError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        match self.0 {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    visitor.visit_i64(v)
                } else if let Some(v) = n.as_u64() {
                    visitor.visit_u64(v)
                } else {
                    visitor.visit_f64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => visitor.visit_string(s),
            Value::Array(items) => visitor.visit_seq(SeqDeser(items.into_iter())),
            Value::Object(map) => visitor.visit_map(MapDeser {
                entries: map.into_iter().collect::<Vec<_>>().into_iter(),
                pending: None,
            }),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        match self.0 {
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Number(ref n) => match n.as_i64() {
                Some(0) => visitor.visit_bool(false),
                Some(1) => visitor.visit_bool(true),
                _ => Err(self.mismatch("bool")),
            },
            Value::String(ref s) => match s.trim() {
                s if s.eq_ignore_ascii_case("true") || s == "1" => visitor.visit_bool(true),
                s if s.eq_ignore_ascii_case("false") || s == "0" => visitor.visit_bool(false),
                s => Err(ConvError(format!("cannot parse '{s}' as a bool"))),
            },
            _ => Err(self.mismatch("bool")),
        }
    }

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        self.visit_integer(visitor)
    }

    fn deserialize_i16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        self.visit_integer(visitor)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        self.visit_integer(visitor)
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        self.visit_integer(visitor)
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        self.visit_integer(visitor)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        self.visit_integer(visitor)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        self.visit_integer(visitor)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        self.visit_integer(visitor)
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        self.visit_float(visitor)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        self.visit_float(visitor)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        match self.0 {
            Value::String(ref s) if s.chars().count() == 1 => {
                visitor.visit_char(s.chars().next().unwrap_or_default())
            }
            _ => Err(self.mismatch("char")),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        match self.0 {
            Value::String(s) => visitor.visit_string(s),
            Value::Number(n) => visitor.visit_string(n.to_string()),
            Value::Bool(b) => visitor.visit_string(b.to_string()),
            _ => Err(self.mismatch("string")),
        }
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        match self.0 {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ConvError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ConvError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        match self.0 {
            Value::Array(items) => visitor.visit_seq(SeqDeser(items.into_iter())),
            // The single-element array encoding: a textual value may carry a
            // list split on `~`, e.g. "1~2~3".
            Value::String(s) => {
                let items: Vec<Value> = s.split('~').map(|p| Value::String(p.to_string())).collect();
                visitor.visit_seq(SeqDeser(items.into_iter()))
            }
            _ => Err(self.mismatch("array")),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, ConvError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, ConvError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        match self.0 {
            Value::Object(map) => visitor.visit_map(MapDeser {
                entries: map.into_iter().collect::<Vec<_>>().into_iter(),
                pending: None,
            }),
            _ => Err(self.mismatch("object")),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ConvError> {
        let map = match self.0 {
            Value::Object(map) => map,
            other => {
                return Err(ConvError(format!(
                    "cannot convert {} to struct",
                    type_of(&other)
                )))
            }
        };

        // Re-key entries onto the declared field names, matching
        // case-insensitively. Entries matching no field are dropped; with
        // duplicate matches the last one wins.
        let mut entries: Vec<(String, Value)> = Vec::with_capacity(map.len());
        for (key, value) in map {
            let matched = fields
                .iter()
                .find(|f| f.eq_ignore_ascii_case(&key))
                .copied();
            if let Some(field) = matched {
                if let Some(slot) = entries.iter_mut().find(|(k, _)| k == field) {
                    slot.1 = value;
                } else {
                    entries.push((field.to_string(), value));
                }
            }
        }

        visitor.visit_map(MapDeser {
            entries: entries.into_iter(),
            pending: None,
        })
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ConvError> {
        // Enums keep serde_json's behavior; the lenient rules only concern
        // scalar and struct shapes.
        self.0
            .deserialize_enum(name, variants, visitor)
            .map_err(|e| ConvError(e.to_string()))
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvError> {
        visitor.visit_unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Plus {
        a: i32,
        b: i32,
    }

    #[test]
    fn test_string_to_integer() {
        let v: Plus = from_value(json!({"a": "1", "b": "2"})).unwrap();
        assert_eq!(v, Plus { a: 1, b: 2 });
    }

    #[test]
    fn test_case_insensitive_field_match() {
        let v: Plus = from_value(json!({"A": "1", "B": 2})).unwrap();
        assert_eq!(v, Plus { a: 1, b: 2 });
    }

    #[test]
    fn test_duplicate_spellings_collapse_to_one_field() {
        // serde_json's map orders keys, so "A" is seen before "a" and the
        // later entry wins.
        let v: Plus = from_value(json!({"a": "1", "A": "3", "b": "2"})).unwrap();
        assert_eq!(v.a, 1);
    }

    #[derive(Debug, Deserialize)]
    struct Mixed {
        name: String,
        active: bool,
        score: f64,
        tags: Vec<i64>,
        note: Option<String>,
    }

    #[test]
    fn test_lenient_scalars_and_tilde_lists() {
        let v: Mixed = from_value(json!({
            "Name": 42,
            "Active": "true",
            "Score": "2.5",
            "Tags": "1~2~3",
            "Note": null,
        }))
        .unwrap();
        assert_eq!(v.name, "42");
        assert!(v.active);
        assert_eq!(v.score, 2.5);
        assert_eq!(v.tags, vec![1, 2, 3]);
        assert!(v.note.is_none());
    }

    #[test]
    fn test_json_array_passes_through() {
        let v: Mixed = from_value(json!({
            "name": "x",
            "active": true,
            "score": 1,
            "tags": [4, 5],
        }))
        .unwrap();
        assert_eq!(v.tags, vec![4, 5]);
    }

    #[derive(Debug, Deserialize)]
    struct Outer {
        inner: Inner,
    }

    #[derive(Debug, Deserialize)]
    struct Inner {
        id: u32,
    }

    #[test]
    fn test_nested_structs_stay_case_insensitive() {
        let v: Outer = from_value(json!({"Inner": {"ID": "7"}})).unwrap();
        assert_eq!(v.inner.id, 7);
    }

    #[test]
    fn test_missing_required_field_fails() {
        let err = from_value::<Plus>(json!({"a": "1"})).unwrap_err();
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn test_bad_number_fails() {
        let err = from_value::<Plus>(json!({"a": "x", "b": "2"})).unwrap_err();
        assert!(err.to_string().contains("cannot parse"));
    }

    #[test]
    fn test_map_target_keeps_original_keys() {
        let v: std::collections::HashMap<String, String> =
            from_value(json!({"K": "1"})).unwrap();
        assert_eq!(v.get("K").map(String::as_str), Some("1"));
    }
}
