//! Reading scalar cells from binary rows and ASCII tokens

use super::{Scalar, ScalarType};

impl ScalarType {
    /// Read one little-endian value of this type starting at `offset`.
    ///
    /// Returns `None` if the value would extend past the end of `data`.
    pub fn read_le(&self, data: &[u8], offset: usize) -> Option<Scalar> {
        let bytes = data.get(offset..offset.checked_add(self.size())?)?;

        let value = match self {
            ScalarType::Float32 => Scalar::Float32(f32::from_le_bytes(bytes.try_into().ok()?)),
            ScalarType::Float64 => Scalar::Float64(f64::from_le_bytes(bytes.try_into().ok()?)),
            ScalarType::UInt8 => Scalar::UInt8(bytes[0]),
            ScalarType::UInt16 => Scalar::UInt16(u16::from_le_bytes(bytes.try_into().ok()?)),
            ScalarType::UInt32 => Scalar::UInt32(u32::from_le_bytes(bytes.try_into().ok()?)),
            ScalarType::UInt64 => Scalar::UInt64(u64::from_le_bytes(bytes.try_into().ok()?)),
            ScalarType::Int16 => Scalar::Int16(i16::from_le_bytes(bytes.try_into().ok()?)),
            ScalarType::Int32 => Scalar::Int32(i32::from_le_bytes(bytes.try_into().ok()?)),
            ScalarType::Int64 => Scalar::Int64(i64::from_le_bytes(bytes.try_into().ok()?)),
        };

        Some(value)
    }

    /// Parse one ASCII token as a value of this type.
    pub fn parse_token(&self, token: &str) -> Option<Scalar> {
        let value = match self {
            ScalarType::Float32 => Scalar::Float32(token.parse().ok()?),
            ScalarType::Float64 => Scalar::Float64(token.parse().ok()?),
            ScalarType::UInt8 => Scalar::UInt8(token.parse().ok()?),
            ScalarType::UInt16 => Scalar::UInt16(token.parse().ok()?),
            ScalarType::UInt32 => Scalar::UInt32(token.parse().ok()?),
            ScalarType::UInt64 => Scalar::UInt64(token.parse().ok()?),
            ScalarType::Int16 => Scalar::Int16(token.parse().ok()?),
            ScalarType::Int32 => Scalar::Int32(token.parse().ok()?),
            ScalarType::Int64 => Scalar::Int64(token.parse().ok()?),
        };

        Some(value)
    }
}
