//! Native → [`Value`] encoding through serde.
//!
//! Integers must fit in an XML-RPC `i4`, and absent values (`None`, `()`)
//! are rejected: every argument has to become a concrete wire value.

use serde::ser::{self, Impossible, Serialize};

use crate::error::{GbxError, Result};
use crate::value::Value;

/// Encode any serializable value into a [`Value`].
pub fn to_value<T: ?Sized + Serialize>(value: &T) -> Result<Value> {
    value.serialize(ValueSerializer)
}

fn int_out_of_range(v: impl std::fmt::Display) -> GbxError {
    GbxError::TypeMismatch(format!("integer {} does not fit in i4", v))
}

fn unrepresentable(what: &str) -> GbxError {
    GbxError::TypeMismatch(format!("{} has no XML-RPC representation", what))
}

/// Serializer whose output is a [`Value`] tree.
pub struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = GbxError;

    type SerializeSeq = ArraySerializer;
    type SerializeTuple = ArraySerializer;
    type SerializeTupleStruct = ArraySerializer;
    type SerializeTupleVariant = Impossible<Value, GbxError>;
    type SerializeMap = StructSerializer;
    type SerializeStruct = StructSerializer;
    type SerializeStructVariant = Impossible<Value, GbxError>;

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::Boolean(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        Ok(Value::Int(i32::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        Ok(Value::Int(i32::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        Ok(Value::Int(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        i32::try_from(v).map(Value::Int).map_err(|_| int_out_of_range(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        Ok(Value::Int(i32::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        Ok(Value::Int(i32::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        i32::try_from(v).map(Value::Int).map_err(|_| int_out_of_range(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        i32::try_from(v).map(Value::Int).map_err(|_| int_out_of_range(v))
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        if !v.is_finite() {
            return Err(GbxError::TypeMismatch(format!(
                "{} has no XML-RPC representation",
                v
            )));
        }
        Ok(Value::Double(v))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::Base64(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Value> {
        Err(unrepresentable("None"))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Err(unrepresentable("()"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<Value> {
        Err(unrepresentable(name))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _value: &T,
    ) -> Result<Value> {
        Err(unrepresentable(&format!("enum variant {}::{}", name, variant)))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<ArraySerializer> {
        Ok(ArraySerializer {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<ArraySerializer> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<ArraySerializer> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(unrepresentable(&format!("enum variant {}::{}", name, variant)))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<StructSerializer> {
        Ok(StructSerializer {
            members: Vec::with_capacity(len.unwrap_or(0)),
            next_name: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<StructSerializer> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(unrepresentable(&format!("enum variant {}::{}", name, variant)))
    }
}

/// Collects sequence and tuple elements into a [`Value::Array`].
pub struct ArraySerializer {
    items: Vec<Value>,
}

impl ser::SerializeSeq for ArraySerializer {
    type Ok = Value;
    type Error = GbxError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.items.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTuple for ArraySerializer {
    type Ok = Value;
    type Error = GbxError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for ArraySerializer {
    type Ok = Value;
    type Error = GbxError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

/// Collects struct fields and string-keyed map entries into a [`Value::Struct`].
pub struct StructSerializer {
    members: Vec<(String, Value)>,
    next_name: Option<String>,
}

impl ser::SerializeMap for StructSerializer {
    type Ok = Value;
    type Error = GbxError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        match to_value(key)? {
            Value::String(name) => {
                self.next_name = Some(name);
                Ok(())
            }
            other => Err(GbxError::TypeMismatch(format!(
                "struct member names must be strings, found {}",
                other.type_name()
            ))),
        }
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let name = self
            .next_name
            .take()
            .ok_or_else(|| GbxError::TypeMismatch("map value without a key".to_string()))?;
        self.members.push((name, to_value(value)?));
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Struct(self.members))
    }
}

impl ser::SerializeStruct for StructSerializer {
    type Ok = Value;
    type Error = GbxError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.members.push((key.to_string(), to_value(value)?));
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Struct(self.members))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct CallVoteRatio {
        command: String,
        ratio: f64,
    }

    #[test]
    fn test_scalars() {
        assert_eq!(to_value(&true).unwrap(), Value::Boolean(true));
        assert_eq!(to_value(&42u8).unwrap(), Value::Int(42));
        assert_eq!(to_value(&-7i64).unwrap(), Value::Int(-7));
        assert_eq!(to_value(&0.5f32).unwrap(), Value::Double(0.5));
        assert_eq!(to_value("login").unwrap(), Value::String("login".into()));
    }

    #[test]
    fn test_non_finite_doubles_rejected() {
        for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(to_value(&v), Err(GbxError::TypeMismatch(_))));
        }
        assert!(to_value(&f32::NAN).is_err());
        assert!(to_value(&vec![1.0, f64::INFINITY]).is_err());
        assert_eq!(to_value(&f64::MAX).unwrap(), Value::Double(f64::MAX));
    }

    #[test]
    fn test_integer_overflow_rejected() {
        let err = to_value(&(i64::from(i32::MAX) + 1)).unwrap_err();
        assert!(matches!(err, GbxError::TypeMismatch(_)));
        assert!(to_value(&u32::MAX).is_err());
    }

    #[test]
    fn test_struct_keeps_field_order() {
        let ratio = CallVoteRatio {
            command: "RestartMap".into(),
            ratio: 0.6,
        };
        let value = to_value(&ratio).unwrap();
        assert_eq!(
            value,
            Value::Struct(vec![
                ("Command".into(), Value::String("RestartMap".into())),
                ("Ratio".into(), Value::Double(0.6)),
            ])
        );
    }

    #[test]
    fn test_sequences_and_maps() {
        let value = to_value(&vec![1, 2, 3]).unwrap();
        assert_eq!(
            value,
            Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );

        let mut map = BTreeMap::new();
        map.insert("a", 1);
        assert_eq!(
            to_value(&map).unwrap(),
            Value::Struct(vec![("a".into(), Value::Int(1))])
        );

        let mut bad = BTreeMap::new();
        bad.insert(1, 1);
        assert!(to_value(&bad).is_err());
    }

    #[test]
    fn test_absent_values_rejected() {
        assert!(to_value(&None::<i32>).is_err());
        assert!(to_value(&()).is_err());
        assert_eq!(to_value(&Some(3)).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_bytes_become_base64() {
        let value = to_value(&serde_bytes::Bytes::new(b"\x00\x01")).unwrap();
        assert_eq!(value, Value::Base64(vec![0, 1]));
    }
}
