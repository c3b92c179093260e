//! [`Value`] → native decoding through serde.
//!
//! Decoding is driven by the requested type, not only by the wire tag: an
//! `i4` fills any integer width that can hold it, a `<struct>` fills a record
//! by member name, and an `<array>` fills a record positionally (callback
//! parameter lists arrive that way). Unknown struct members and surplus array
//! elements are ignored.

use serde::de::value::StringDeserializer;
use serde::de::{self, DeserializeOwned, DeserializeSeed, MapAccess, SeqAccess, Visitor};

use crate::error::{GbxError, Result};
use crate::value::Value;

/// Decode a [`Value`] into the requested native type.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    T::deserialize(value)
}

fn mismatch(expected: &str, found: &Value) -> GbxError {
    GbxError::TypeMismatch(format!("expected {}, found {}", expected, found.type_name()))
}

fn visit_array<'de, V: Visitor<'de>>(items: Vec<Value>, visitor: V) -> Result<V::Value> {
    let mut seq = SeqDeserializer {
        iter: items.into_iter(),
    };
    visitor.visit_seq(&mut seq)
}

fn visit_struct<'de, V: Visitor<'de>>(
    members: Vec<(String, Value)>,
    visitor: V,
) -> Result<V::Value> {
    let mut map = MapDeserializer {
        iter: members.into_iter(),
        value: None,
    };
    visitor.visit_map(&mut map)
}

macro_rules! deserialize_integer {
    ($($method:ident),*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
                match self {
                    Value::Int(i) => visitor.visit_i32(i),
                    other => Err(mismatch("i4", &other)),
                }
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for Value {
    type Error = GbxError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            Value::Boolean(b) => visitor.visit_bool(b),
            Value::Int(i) => visitor.visit_i32(i),
            Value::Double(d) => visitor.visit_f64(d),
            Value::String(s) => visitor.visit_string(s),
            Value::Base64(bytes) => visitor.visit_byte_buf(bytes),
            Value::Array(items) => visit_array(items, visitor),
            Value::Struct(members) => visit_struct(members, visitor),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            Value::Boolean(b) => visitor.visit_bool(b),
            other => Err(mismatch("boolean", &other)),
        }
    }

    deserialize_integer!(
        deserialize_i8,
        deserialize_i16,
        deserialize_i32,
        deserialize_i64,
        deserialize_u8,
        deserialize_u16,
        deserialize_u32,
        deserialize_u64
    );

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_f64(visitor)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            Value::Double(d) => visitor.visit_f64(d),
            Value::Int(i) => visitor.visit_f64(f64::from(i)),
            other => Err(mismatch("double", &other)),
        }
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_string(visitor)
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            Value::String(s) => visitor.visit_string(s),
            other => Err(mismatch("string", &other)),
        }
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_byte_buf(visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            Value::Base64(bytes) => visitor.visit_byte_buf(bytes),
            other => Err(mismatch("base64", &other)),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        // A value that made it onto the wire is always present.
        visitor.visit_some(self)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(GbxError::TypeMismatch(
            "() is not a decodable target shape".to_string(),
        ))
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        _visitor: V,
    ) -> Result<V::Value> {
        Err(GbxError::TypeMismatch(format!(
            "unit struct {} is not a decodable target shape",
            name
        )))
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            Value::Array(items) => visit_array(items, visitor),
            other => Err(mismatch("array", &other)),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            Value::Struct(members) => visit_struct(members, visitor),
            other => Err(mismatch("struct", &other)),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self {
            Value::Struct(members) => visit_struct(members, visitor),
            Value::Array(items) => visit_array(items, visitor),
            other => Err(mismatch("struct", &other)),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self {
            Value::String(variant) => visitor.visit_enum(StringDeserializer::<GbxError>::new(variant)),
            other => Err(mismatch(&format!("string naming a {} variant", name), &other)),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        drop(self);
        visitor.visit_unit()
    }
}

struct SeqDeserializer {
    iter: std::vec::IntoIter<Value>,
}

impl<'de> SeqAccess<'de> for SeqDeserializer {
    type Error = GbxError;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        match self.iter.next() {
            Some(value) => seed.deserialize(value).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapDeserializer {
    iter: std::vec::IntoIter<(String, Value)>,
    value: Option<Value>,
}

impl<'de> MapAccess<'de> for MapDeserializer {
    type Error = GbxError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        match self.iter.next() {
            Some((name, value)) => {
                self.value = Some(value);
                seed.deserialize(Value::String(name)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let value = self
            .value
            .take()
            .ok_or_else(|| GbxError::TypeMismatch("struct value requested before its name".to_string()))?;
        seed.deserialize(value)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Deserialize, Debug, PartialEq)]
    #[serde(rename_all = "PascalCase")]
    struct CurrentCallVote {
        caller_login: String,
        cmd_name: String,
        cmd_param: String,
    }

    fn vote_struct() -> Value {
        Value::Struct(vec![
            ("CallerLogin".into(), Value::from("admin")),
            ("CmdName".into(), Value::from("NextMap")),
            ("CmdParam".into(), Value::from("")),
            ("Extra".into(), Value::Int(1)),
        ])
    }

    #[test]
    fn test_struct_by_name_ignores_unknown_members() {
        let vote: CurrentCallVote = from_value(vote_struct()).unwrap();
        assert_eq!(vote.caller_login, "admin");
        assert_eq!(vote.cmd_name, "NextMap");
    }

    #[test]
    fn test_struct_missing_field_is_mismatch() {
        let value = Value::Struct(vec![("CallerLogin".into(), Value::from("admin"))]);
        let err = from_value::<CurrentCallVote>(value).unwrap_err();
        assert!(matches!(err, GbxError::TypeMismatch(ref m) if m.contains("CmdName")));
    }

    #[test]
    fn test_record_from_array_is_positional() {
        #[derive(Deserialize)]
        struct PlayerConnect {
            login: String,
            is_spectator: bool,
        }

        let params = Value::Array(vec![
            Value::from("login123"),
            Value::Boolean(true),
            Value::from("surplus"),
        ]);
        let args: PlayerConnect = from_value(params).unwrap();
        assert_eq!(args.login, "login123");
        assert!(args.is_spectator);
    }

    #[test]
    fn test_integer_widths() {
        assert_eq!(from_value::<u8>(Value::Int(200)).unwrap(), 200);
        assert_eq!(from_value::<i64>(Value::Int(-5)).unwrap(), -5);
        assert!(matches!(
            from_value::<u8>(Value::Int(300)),
            Err(GbxError::TypeMismatch(_))
        ));
        assert!(from_value::<u32>(Value::Int(-1)).is_err());
    }

    #[test]
    fn test_scalar_tag_mismatch() {
        assert!(from_value::<bool>(Value::Int(1)).is_err());
        assert!(from_value::<String>(Value::Int(1)).is_err());
        assert!(from_value::<i32>(Value::Double(1.0)).is_err());
        // i4 widens into double.
        assert_eq!(from_value::<f64>(Value::Int(2)).unwrap(), 2.0);
    }

    #[test]
    fn test_array_of_records_any_length() {
        let value = Value::Array(vec![vote_struct(), vote_struct()]);
        let votes: Vec<CurrentCallVote> = from_value(value).unwrap();
        assert_eq!(votes.len(), 2);

        let empty: Vec<CurrentCallVote> = from_value(Value::Array(vec![])).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_struct_into_map() {
        let map: HashMap<String, i32> = from_value(Value::Struct(vec![
            ("a".into(), Value::Int(1)),
            ("b".into(), Value::Int(2)),
        ]))
        .unwrap();
        assert_eq!(map["b"], 2);
    }

    #[test]
    fn test_unit_target_rejected() {
        assert!(from_value::<()>(Value::Boolean(true)).is_err());
    }

    #[test]
    fn test_enum_unit_variant_by_name() {
        #[derive(Deserialize, Debug, PartialEq)]
        enum Mode {
            Script,
            Rounds,
        }
        assert_eq!(from_value::<Mode>(Value::from("Rounds")).unwrap(), Mode::Rounds);
        assert!(from_value::<Mode>(Value::from("Laps")).is_err());
    }

    #[test]
    fn test_value_passthrough() {
        let original = vote_struct();
        let decoded: Value = from_value(original.clone()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_base64_into_byte_buf() {
        let buf: serde_bytes::ByteBuf = from_value(Value::Base64(vec![1, 2, 3])).unwrap();
        assert_eq!(buf.as_ref(), &[1, 2, 3]);
    }
}
