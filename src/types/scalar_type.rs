//! Point field type definitions

use serde::{Deserialize, Serialize};

/// Field kind as declared on a container's `TYPE` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// `F` - IEEE floating point
    Float,
    /// `U` - unsigned integer
    Unsigned,
    /// `I` - signed integer
    Signed,
}

impl FieldKind {
    /// Parse a `TYPE` token (case-insensitive single letter).
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "F" | "f" => Some(FieldKind::Float),
            "U" | "u" => Some(FieldKind::Unsigned),
            "I" | "i" => Some(FieldKind::Signed),
            _ => None,
        }
    }

    /// The single-letter token used in container headers.
    pub const fn token(&self) -> &'static str {
        match self {
            FieldKind::Float => "F",
            FieldKind::Unsigned => "U",
            FieldKind::Signed => "I",
        }
    }
}

/// Supported scalar column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Float32,
    Float64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int16,
    Int32,
    Int64,
}

impl ScalarType {
    /// Look up the scalar type for a declared `(TYPE, SIZE)` pair.
    ///
    /// Returns `None` for pairs outside the fixed table (for example `I 1` or `F 2`).
    pub const fn from_declaration(kind: FieldKind, size: usize) -> Option<Self> {
        match (kind, size) {
            (FieldKind::Float, 4) => Some(ScalarType::Float32),
            (FieldKind::Float, 8) => Some(ScalarType::Float64),
            (FieldKind::Unsigned, 1) => Some(ScalarType::UInt8),
            (FieldKind::Unsigned, 2) => Some(ScalarType::UInt16),
            (FieldKind::Unsigned, 4) => Some(ScalarType::UInt32),
            (FieldKind::Unsigned, 8) => Some(ScalarType::UInt64),
            (FieldKind::Signed, 2) => Some(ScalarType::Int16),
            (FieldKind::Signed, 4) => Some(ScalarType::Int32),
            (FieldKind::Signed, 8) => Some(ScalarType::Int64),
            _ => None,
        }
    }

    /// Returns the size in bytes of this data type.
    pub const fn size(&self) -> usize {
        match self {
            ScalarType::UInt8 => 1,
            ScalarType::UInt16 | ScalarType::Int16 => 2,
            ScalarType::Float32 | ScalarType::UInt32 | ScalarType::Int32 => 4,
            ScalarType::Float64 | ScalarType::UInt64 | ScalarType::Int64 => 8,
        }
    }
}

/// Runtime value of a single table cell.
///
/// Serializes as a bare JSON number so tables read naturally on the client side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Float32(f32),
    Float64(f64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Int16(i16),
    Int32(i32),
    Int64(i64),
}

impl Scalar {
    /// The column type this value belongs to.
    pub const fn scalar_type(&self) -> ScalarType {
        match self {
            Scalar::Float32(_) => ScalarType::Float32,
            Scalar::Float64(_) => ScalarType::Float64,
            Scalar::UInt8(_) => ScalarType::UInt8,
            Scalar::UInt16(_) => ScalarType::UInt16,
            Scalar::UInt32(_) => ScalarType::UInt32,
            Scalar::UInt64(_) => ScalarType::UInt64,
            Scalar::Int16(_) => ScalarType::Int16,
            Scalar::Int32(_) => ScalarType::Int32,
            Scalar::Int64(_) => ScalarType::Int64,
        }
    }

    /// Widen to `f64` for numeric projections.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::Float32(v) => v as f64,
            Scalar::Float64(v) => v,
            Scalar::UInt8(v) => v as f64,
            Scalar::UInt16(v) => v as f64,
            Scalar::UInt32(v) => v as f64,
            Scalar::UInt64(v) => v as f64,
            Scalar::Int16(v) => v as f64,
            Scalar::Int32(v) => v as f64,
            Scalar::Int64(v) => v as f64,
        }
    }
}
