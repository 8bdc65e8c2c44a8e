use crate::error::DbError;
use crate::udbc::value::Value;
use serde::Serialize;
use serde::ser::{self, Impossible, Serializer};

/// Parameters extracted from a `Serialize` argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    Positional(Vec<Value>),
    Named(Vec<(String, Value)>),
}

/// Converts `args` into statement parameters.
///
/// Structs and maps bind by name in field order, tuples and sequences bind
/// positionally, `()` binds nothing and a scalar binds a single value.
pub fn to_params<T: Serialize + ?Sized>(args: &T) -> Result<Params, DbError> {
    args.serialize(ParamsSerializer)
}

/// Converts a scalar into a [`Value`]. Compound values cannot be bound.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, DbError> {
    value.serialize(ValueSerializer)
}

fn not_bindable(kind: &str) -> DbError {
    DbError::Value(format!("{} cannot be bound as a single parameter", kind))
}

pub struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = DbError;
    type SerializeSeq = Impossible<Value, DbError>;
    type SerializeTuple = Impossible<Value, DbError>;
    type SerializeTupleStruct = Impossible<Value, DbError>;
    type SerializeTupleVariant = Impossible<Value, DbError>;
    type SerializeMap = Impossible<Value, DbError>;
    type SerializeStruct = Impossible<Value, DbError>;
    type SerializeStructVariant = Impossible<Value, DbError>;

    fn serialize_bool(self, v: bool) -> Result<Value, DbError> {
        Ok(Value::Bool(v))
    }
    fn serialize_i8(self, v: i8) -> Result<Value, DbError> {
        Ok(Value::I64(v as i64))
    }
    fn serialize_i16(self, v: i16) -> Result<Value, DbError> {
        Ok(Value::I64(v as i64))
    }
    fn serialize_i32(self, v: i32) -> Result<Value, DbError> {
        Ok(Value::I64(v as i64))
    }
    fn serialize_i64(self, v: i64) -> Result<Value, DbError> {
        Ok(Value::I64(v))
    }
    fn serialize_u8(self, v: u8) -> Result<Value, DbError> {
        Ok(Value::I64(v as i64))
    }
    fn serialize_u16(self, v: u16) -> Result<Value, DbError> {
        Ok(Value::I64(v as i64))
    }
    fn serialize_u32(self, v: u32) -> Result<Value, DbError> {
        Ok(Value::I64(v as i64))
    }
    fn serialize_u64(self, v: u64) -> Result<Value, DbError> {
        i64::try_from(v)
            .map(Value::I64)
            .map_err(|_| DbError::Value(format!("{} does not fit in a signed 64-bit column", v)))
    }
    fn serialize_f32(self, v: f32) -> Result<Value, DbError> {
        Ok(Value::F64(v as f64))
    }
    fn serialize_f64(self, v: f64) -> Result<Value, DbError> {
        Ok(Value::F64(v))
    }
    fn serialize_char(self, v: char) -> Result<Value, DbError> {
        Ok(Value::Str(v.to_string()))
    }
    fn serialize_str(self, v: &str) -> Result<Value, DbError> {
        Ok(Value::Str(v.to_string()))
    }
    fn serialize_bytes(self, v: &[u8]) -> Result<Value, DbError> {
        Ok(Value::Bytes(v.to_vec()))
    }
    fn serialize_none(self) -> Result<Value, DbError> {
        Ok(Value::Null)
    }
    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, DbError> {
        value.serialize(self)
    }
    fn serialize_unit(self) -> Result<Value, DbError> {
        Ok(Value::Null)
    }
    fn serialize_unit_struct(self, _: &'static str) -> Result<Value, DbError> {
        Ok(Value::Null)
    }
    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
    ) -> Result<Value, DbError> {
        Ok(Value::Str(variant.to_string()))
    }
    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<Value, DbError> {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        _: &T,
    ) -> Result<Value, DbError> {
        Err(not_bindable(variant))
    }
    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq, DbError> {
        Err(not_bindable("sequence"))
    }
    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple, DbError> {
        Err(not_bindable("tuple"))
    }
    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleStruct, DbError> {
        Err(not_bindable(name))
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant, DbError> {
        Err(not_bindable(variant))
    }
    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap, DbError> {
        Err(not_bindable("map"))
    }
    fn serialize_struct(
        self,
        name: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStruct, DbError> {
        Err(not_bindable(name))
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant, DbError> {
        Err(not_bindable(variant))
    }
}

struct ParamsSerializer;

impl ParamsSerializer {
    fn single(value: Value) -> Result<Params, DbError> {
        Ok(Params::Positional(vec![value]))
    }
}

impl ser::Serializer for ParamsSerializer {
    type Ok = Params;
    type Error = DbError;
    type SerializeSeq = PositionalSerializer;
    type SerializeTuple = PositionalSerializer;
    type SerializeTupleStruct = PositionalSerializer;
    type SerializeTupleVariant = Impossible<Params, DbError>;
    type SerializeMap = NamedSerializer;
    type SerializeStruct = NamedSerializer;
    type SerializeStructVariant = Impossible<Params, DbError>;

    fn serialize_bool(self, v: bool) -> Result<Params, DbError> {
        Self::single(ValueSerializer.serialize_bool(v)?)
    }
    fn serialize_i8(self, v: i8) -> Result<Params, DbError> {
        Self::single(ValueSerializer.serialize_i8(v)?)
    }
    fn serialize_i16(self, v: i16) -> Result<Params, DbError> {
        Self::single(ValueSerializer.serialize_i16(v)?)
    }
    fn serialize_i32(self, v: i32) -> Result<Params, DbError> {
        Self::single(ValueSerializer.serialize_i32(v)?)
    }
    fn serialize_i64(self, v: i64) -> Result<Params, DbError> {
        Self::single(ValueSerializer.serialize_i64(v)?)
    }
    fn serialize_u8(self, v: u8) -> Result<Params, DbError> {
        Self::single(ValueSerializer.serialize_u8(v)?)
    }
    fn serialize_u16(self, v: u16) -> Result<Params, DbError> {
        Self::single(ValueSerializer.serialize_u16(v)?)
    }
    fn serialize_u32(self, v: u32) -> Result<Params, DbError> {
        Self::single(ValueSerializer.serialize_u32(v)?)
    }
    fn serialize_u64(self, v: u64) -> Result<Params, DbError> {
        Self::single(ValueSerializer.serialize_u64(v)?)
    }
    fn serialize_f32(self, v: f32) -> Result<Params, DbError> {
        Self::single(ValueSerializer.serialize_f32(v)?)
    }
    fn serialize_f64(self, v: f64) -> Result<Params, DbError> {
        Self::single(ValueSerializer.serialize_f64(v)?)
    }
    fn serialize_char(self, v: char) -> Result<Params, DbError> {
        Self::single(ValueSerializer.serialize_char(v)?)
    }
    fn serialize_str(self, v: &str) -> Result<Params, DbError> {
        Self::single(ValueSerializer.serialize_str(v)?)
    }
    fn serialize_bytes(self, v: &[u8]) -> Result<Params, DbError> {
        Self::single(ValueSerializer.serialize_bytes(v)?)
    }
    fn serialize_none(self) -> Result<Params, DbError> {
        Self::single(Value::Null)
    }
    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Params, DbError> {
        value.serialize(self)
    }
    fn serialize_unit(self) -> Result<Params, DbError> {
        Ok(Params::Positional(Vec::new()))
    }
    fn serialize_unit_struct(self, _: &'static str) -> Result<Params, DbError> {
        Ok(Params::Positional(Vec::new()))
    }
    fn serialize_unit_variant(
        self,
        name: &'static str,
        index: u32,
        variant: &'static str,
    ) -> Result<Params, DbError> {
        Self::single(ValueSerializer.serialize_unit_variant(name, index, variant)?)
    }
    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<Params, DbError> {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        _: &T,
    ) -> Result<Params, DbError> {
        Err(not_bindable(variant))
    }
    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, DbError> {
        Ok(PositionalSerializer {
            values: Vec::with_capacity(len.unwrap_or(0)),
        })
    }
    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, DbError> {
        self.serialize_seq(Some(len))
    }
    fn serialize_tuple_struct(
        self,
        _: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, DbError> {
        self.serialize_seq(Some(len))
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant, DbError> {
        Err(not_bindable(variant))
    }
    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, DbError> {
        Ok(NamedSerializer {
            values: Vec::with_capacity(len.unwrap_or(0)),
            key: None,
        })
    }
    fn serialize_struct(
        self,
        _: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct, DbError> {
        self.serialize_map(Some(len))
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant, DbError> {
        Err(not_bindable(variant))
    }
}

pub struct PositionalSerializer {
    values: Vec<Value>,
}

macro_rules! impl_positional {
    ($trait:ident, $method:ident) => {
        impl ser::$trait for PositionalSerializer {
            type Ok = Params;
            type Error = DbError;

            fn $method<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), DbError> {
                self.values.push(value.serialize(ValueSerializer)?);
                Ok(())
            }

            fn end(self) -> Result<Params, DbError> {
                Ok(Params::Positional(self.values))
            }
        }
    };
}

impl_positional!(SerializeSeq, serialize_element);
impl_positional!(SerializeTuple, serialize_element);
impl_positional!(SerializeTupleStruct, serialize_field);

pub struct NamedSerializer {
    values: Vec<(String, Value)>,
    key: Option<String>,
}

impl ser::SerializeMap for NamedSerializer {
    type Ok = Params;
    type Error = DbError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), DbError> {
        match key.serialize(ValueSerializer)? {
            Value::Str(s) => {
                self.key = Some(s);
                Ok(())
            }
            other => Err(DbError::Value(format!(
                "parameter names must be strings, got {:?}",
                other
            ))),
        }
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), DbError> {
        let key = self
            .key
            .take()
            .ok_or_else(|| DbError::Value("missing parameter name for value".into()))?;
        self.values.push((key, value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Params, DbError> {
        Ok(Params::Named(self.values))
    }
}

impl ser::SerializeStruct for NamedSerializer {
    type Ok = Params;
    type Error = DbError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), DbError> {
        self.values
            .push((key.to_string(), value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Params, DbError> {
        Ok(Params::Named(self.values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Ad {
        entity: String,
        budget: Option<f64>,
        active: bool,
    }

    #[test]
    fn test_struct_binds_by_name_in_field_order() {
        let ad = Ad {
            entity: "campaign".into(),
            budget: None,
            active: true,
        };
        let params = to_params(&ad).unwrap();
        assert_eq!(
            params,
            Params::Named(vec![
                ("entity".into(), Value::from("campaign")),
                ("budget".into(), Value::Null),
                ("active".into(), Value::Bool(true)),
            ])
        );
    }

    #[test]
    fn test_tuple_and_unit() {
        assert_eq!(
            to_params(&(1, "hello")).unwrap(),
            Params::Positional(vec![Value::I64(1), Value::from("hello")])
        );
        assert_eq!(to_params(&()).unwrap(), Params::Positional(vec![]));
        assert_eq!(
            to_params(&42u32).unwrap(),
            Params::Positional(vec![Value::I64(42)])
        );
    }

    #[test]
    fn test_map_binds_by_name() {
        let mut map = BTreeMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        assert_eq!(
            to_params(&map).unwrap(),
            Params::Named(vec![("a".into(), Value::I64(1)), ("b".into(), Value::I64(2))])
        );
    }

    #[test]
    fn test_nested_values_are_rejected() {
        #[derive(Serialize)]
        struct Outer {
            ids: Vec<i32>,
        }
        let err = to_params(&Outer { ids: vec![1] }).unwrap_err();
        assert!(matches!(err, DbError::Value(_)));
        assert!(to_value(&u64::MAX).is_err());
    }
}
