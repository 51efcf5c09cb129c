//! Tagged Value Module
//!
//! The closed set of value kinds the cache stores, how arbitrary serializable
//! inputs are classified into it, and the numeric conversions between kinds.

use std::fmt;

use serde::ser::{self, Impossible, Serialize, Serializer};

use crate::error::{CacheError, Result};

// == Type Tag ==
/// Numeric tag recorded next to each value in the command log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    Int = 0,
    Uint = 1,
    Float = 2,
    String = 3,
    Obj = 4,
}

impl TypeTag {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(TypeTag::Int),
            1 => Some(TypeTag::Uint),
            2 => Some(TypeTag::Float),
            3 => Some(TypeTag::String),
            4 => Some(TypeTag::Obj),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Int => "int",
            TypeTag::Uint => "uint",
            TypeTag::Float => "float",
            TypeTag::String => "string",
            TypeTag::Obj => "object",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// == Tagged Value ==
/// A stored cache value.
///
/// `Obj` holds the JSON encoding of any value that is not one of the four
/// scalar kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum TaggedValue {
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Obj(Vec<u8>),
}

/// Why a numeric conversion failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionError {
    /// The stored kind cannot represent the requested one
    Mismatch,
    /// Same family of kinds but the magnitude does not fit
    OutOfRange,
}

// 2^63 and 2^64, exactly representable as f64.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

impl TaggedValue {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            TaggedValue::Int(_) => TypeTag::Int,
            TaggedValue::Uint(_) => TypeTag::Uint,
            TaggedValue::Float(_) => TypeTag::Float,
            TaggedValue::Str(_) => TypeTag::String,
            TaggedValue::Obj(_) => TypeTag::Obj,
        }
    }

    // == Conversions ==
    /// Converts to a signed integer. Floats must be integral and in range.
    pub fn to_i64(&self) -> std::result::Result<i64, ConversionError> {
        match *self {
            TaggedValue::Int(n) => Ok(n),
            TaggedValue::Uint(n) => i64::try_from(n).map_err(|_| ConversionError::OutOfRange),
            TaggedValue::Float(f) => {
                integral(f)?;
                if (-I64_BOUND..I64_BOUND).contains(&f) {
                    Ok(f as i64)
                } else {
                    Err(ConversionError::OutOfRange)
                }
            }
            TaggedValue::Str(_) | TaggedValue::Obj(_) => Err(ConversionError::Mismatch),
        }
    }

    /// Converts to an unsigned integer. Negative values are out of range.
    pub fn to_u64(&self) -> std::result::Result<u64, ConversionError> {
        match *self {
            TaggedValue::Int(n) => u64::try_from(n).map_err(|_| ConversionError::OutOfRange),
            TaggedValue::Uint(n) => Ok(n),
            TaggedValue::Float(f) => {
                integral(f)?;
                if (0.0..U64_BOUND).contains(&f) {
                    Ok(f as u64)
                } else {
                    Err(ConversionError::OutOfRange)
                }
            }
            TaggedValue::Str(_) | TaggedValue::Obj(_) => Err(ConversionError::Mismatch),
        }
    }

    /// Converts to a float. Integers always convert.
    pub fn to_f64(&self) -> std::result::Result<f64, ConversionError> {
        match *self {
            TaggedValue::Int(n) => Ok(n as f64),
            TaggedValue::Uint(n) => Ok(n as f64),
            TaggedValue::Float(f) => Ok(f),
            TaggedValue::Str(_) | TaggedValue::Obj(_) => Err(ConversionError::Mismatch),
        }
    }

    /// Returns the boolean only when the value is an object payload holding exactly `true`/`false`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TaggedValue::Obj(bytes) => serde_json::from_slice::<bool>(bytes).ok(),
            _ => None,
        }
    }
}

fn integral(f: f64) -> std::result::Result<(), ConversionError> {
    if f.is_nan() {
        return Err(ConversionError::Mismatch);
    }
    if f.is_infinite() {
        return Err(ConversionError::OutOfRange);
    }
    if f.fract() != 0.0 {
        return Err(ConversionError::Mismatch);
    }
    Ok(())
}

impl From<i64> for TaggedValue {
    fn from(v: i64) -> Self {
        TaggedValue::Int(v)
    }
}

impl From<u64> for TaggedValue {
    fn from(v: u64) -> Self {
        TaggedValue::Uint(v)
    }
}

impl From<f64> for TaggedValue {
    fn from(v: f64) -> Self {
        TaggedValue::Float(v)
    }
}

impl From<String> for TaggedValue {
    fn from(v: String) -> Self {
        TaggedValue::Str(v)
    }
}

impl From<&str> for TaggedValue {
    fn from(v: &str) -> Self {
        TaggedValue::Str(v.to_string())
    }
}

// == Classification ==
/// Classifies a serializable value into a [`TaggedValue`].
///
/// Scalars map onto their own kind, structured values are JSON-encoded into
/// `Obj`, and sequences, byte slices and optionals are rejected.
pub fn classify<T: Serialize + ?Sized>(value: &T) -> Result<TaggedValue> {
    match value.serialize(Classifier) {
        Ok(tagged) => Ok(tagged),
        Err(Probe::Object) => Ok(TaggedValue::Obj(serde_json::to_vec(value)?)),
        Err(Probe::Rejected(kind)) => Err(CacheError::PointerNotAllowed(kind.to_string())),
        Err(Probe::Custom(msg)) => Err(CacheError::Serialization(ser::Error::custom(msg))),
    }
}

/// Outcome of a top-level probe that is not a plain scalar.
#[derive(Debug)]
enum Probe {
    Object,
    Rejected(&'static str),
    Custom(String),
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::Object => f.write_str("structured value"),
            Probe::Rejected(kind) => write!(f, "{} not allowed", kind),
            Probe::Custom(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Probe {}

impl ser::Error for Probe {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Probe::Custom(msg.to_string())
    }
}

/// Serializer that only looks at the outermost shape of a value.
struct Classifier;

impl Serializer for Classifier {
    type Ok = TaggedValue;
    type Error = Probe;
    type SerializeSeq = Impossible<TaggedValue, Probe>;
    type SerializeTuple = Impossible<TaggedValue, Probe>;
    type SerializeTupleStruct = Impossible<TaggedValue, Probe>;
    type SerializeTupleVariant = Impossible<TaggedValue, Probe>;
    type SerializeMap = Impossible<TaggedValue, Probe>;
    type SerializeStruct = Impossible<TaggedValue, Probe>;
    type SerializeStructVariant = Impossible<TaggedValue, Probe>;

    fn serialize_bool(self, _v: bool) -> std::result::Result<TaggedValue, Probe> {
        Err(Probe::Object)
    }

    fn serialize_i8(self, v: i8) -> std::result::Result<TaggedValue, Probe> {
        Ok(TaggedValue::Int(v.into()))
    }

    fn serialize_i16(self, v: i16) -> std::result::Result<TaggedValue, Probe> {
        Ok(TaggedValue::Int(v.into()))
    }

    fn serialize_i32(self, v: i32) -> std::result::Result<TaggedValue, Probe> {
        Ok(TaggedValue::Int(v.into()))
    }

    fn serialize_i64(self, v: i64) -> std::result::Result<TaggedValue, Probe> {
        Ok(TaggedValue::Int(v))
    }

    fn serialize_u8(self, v: u8) -> std::result::Result<TaggedValue, Probe> {
        Ok(TaggedValue::Uint(v.into()))
    }

    fn serialize_u16(self, v: u16) -> std::result::Result<TaggedValue, Probe> {
        Ok(TaggedValue::Uint(v.into()))
    }

    fn serialize_u32(self, v: u32) -> std::result::Result<TaggedValue, Probe> {
        Ok(TaggedValue::Uint(v.into()))
    }

    fn serialize_u64(self, v: u64) -> std::result::Result<TaggedValue, Probe> {
        Ok(TaggedValue::Uint(v))
    }

    fn serialize_f32(self, v: f32) -> std::result::Result<TaggedValue, Probe> {
        Ok(TaggedValue::Float(v.into()))
    }

    fn serialize_f64(self, v: f64) -> std::result::Result<TaggedValue, Probe> {
        Ok(TaggedValue::Float(v))
    }

    fn serialize_char(self, v: char) -> std::result::Result<TaggedValue, Probe> {
        Ok(TaggedValue::Str(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> std::result::Result<TaggedValue, Probe> {
        Ok(TaggedValue::Str(v.to_string()))
    }

    fn serialize_bytes(self, _v: &[u8]) -> std::result::Result<TaggedValue, Probe> {
        Err(Probe::Rejected("byte slice"))
    }

    fn serialize_none(self) -> std::result::Result<TaggedValue, Probe> {
        Err(Probe::Rejected("option"))
    }

    fn serialize_some<T: Serialize + ?Sized>(
        self,
        _value: &T,
    ) -> std::result::Result<TaggedValue, Probe> {
        Err(Probe::Rejected("option"))
    }

    fn serialize_unit(self) -> std::result::Result<TaggedValue, Probe> {
        Err(Probe::Object)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> std::result::Result<TaggedValue, Probe> {
        Err(Probe::Object)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> std::result::Result<TaggedValue, Probe> {
        Err(Probe::Object)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> std::result::Result<TaggedValue, Probe> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> std::result::Result<TaggedValue, Probe> {
        Err(Probe::Object)
    }

    fn serialize_seq(self, _len: Option<usize>) -> std::result::Result<Self::SerializeSeq, Probe> {
        Err(Probe::Rejected("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> std::result::Result<Self::SerializeTuple, Probe> {
        Err(Probe::Rejected("array"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> std::result::Result<Self::SerializeTupleStruct, Probe> {
        Err(Probe::Object)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Self::SerializeTupleVariant, Probe> {
        Err(Probe::Object)
    }

    fn serialize_map(self, _len: Option<usize>) -> std::result::Result<Self::SerializeMap, Probe> {
        Err(Probe::Object)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> std::result::Result<Self::SerializeStruct, Probe> {
        Err(Probe::Object)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Self::SerializeStructVariant, Probe> {
        Err(Probe::Object)
    }
}
