// Canonical JSON: sorted keys at every depth, compact separators.
// serde_json is built without `preserve_order`, so `Map` is a BTreeMap and
// struct fields are declared in alphabetical order wherever they get hashed.
use crate::error::{BlockchainError, Result};
use serde::ser::{self, Error as _, Serialize, Serializer};

/// Serialize a value into its canonical JSON bytes
pub fn canonical_json<T: Serialize + ?Sized>(data: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(data)
        .map_err(|e| BlockchainError::Serialization(format!("Canonical encoding failed: {e}")))
}

/// Canonical JSON as a string, used when splicing header fields
pub fn canonical_string<T: Serialize + ?Sized>(data: &T) -> Result<String> {
    serde_json::to_string(data)
        .map_err(|e| BlockchainError::Serialization(format!("Canonical encoding failed: {e}")))
}

/// Fail if `data` holds a NaN or infinite float anywhere.
/// serde_json writes those as `null`, so they must be caught before encoding.
pub fn ensure_finite<T: Serialize + ?Sized>(data: &T) -> serde_json::Result<()> {
    data.serialize(FiniteFloats)
}

// Walks a value without producing output, only looking at floats
struct FiniteFloats;

fn check_float(value: f64) -> serde_json::Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(serde_json::Error::custom(format!("non-finite number {value} has no JSON form")))
    }
}

impl Serializer for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, _: bool) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_i8(self, _: i8) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_i16(self, _: i16) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_i32(self, _: i32) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_i64(self, _: i64) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_i128(self, _: i128) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_u8(self, _: u8) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_u16(self, _: u16) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_u32(self, _: u32) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_u64(self, _: u64) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_u128(self, _: u128) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_f32(self, value: f32) -> serde_json::Result<()> {
        check_float(f64::from(value))
    }

    fn serialize_f64(self, value: f64) -> serde_json::Result<()> {
        check_float(value)
    }

    fn serialize_char(self, _: char) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_str(self, _: &str) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_bytes(self, _: &[u8]) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_none(self) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> serde_json::Result<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_unit_struct(self, _: &'static str) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> serde_json::Result<()> {
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        value: &T,
    ) -> serde_json::Result<()> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> serde_json::Result<()> {
        value.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> serde_json::Result<Self> {
        Ok(self)
    }

    fn serialize_tuple(self, _: usize) -> serde_json::Result<Self> {
        Ok(self)
    }

    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> serde_json::Result<Self> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> serde_json::Result<Self> {
        Ok(self)
    }

    fn serialize_map(self, _: Option<usize>) -> serde_json::Result<Self> {
        Ok(self)
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> serde_json::Result<Self> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> serde_json::Result<Self> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> serde_json::Result<()> {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> serde_json::Result<()> {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> serde_json::Result<()> {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> serde_json::Result<()> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> serde_json::Result<()> {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> serde_json::Result<()> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> serde_json::Result<()> {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> serde_json::Result<()> {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> serde_json::Result<()> {
        key.serialize(FiniteFloats)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> serde_json::Result<()> {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> serde_json::Result<()> {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _: &'static str,
        value: &T,
    ) -> serde_json::Result<()> {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> serde_json::Result<()> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _: &'static str,
        value: &T,
    ) -> serde_json::Result<()> {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> serde_json::Result<()> {
        Ok(())
    }
}
