use serde::Serialize;

use crate::protocol::{
    tags, MessageReader, MessageWriter, Payload, WireError, WireReader, WireResult, WireWriter,
};

/// Kind bytes shared by primitive values and array elements
pub mod kinds {
    pub const BOOL: u8 = 0;
    pub const BYTE: u8 = 1;
    pub const INT32: u8 = 2;
    pub const INT64: u8 = 3;
    pub const FLOAT64: u8 = 4;
    pub const STRING: u8 = 5;
}

/// A scalar value understood by both runtimes
///
/// Floats compare by bit pattern, so a decoded NaN equals the value that was
/// encoded and `0.0` differs from `-0.0`.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Primitive {
    Bool(bool),
    Byte(u8),
    Int32(i32),
    Int64(i64),
    Float64(f64),
}

impl Primitive {
    pub fn kind(&self) -> u8 {
        match self {
            Primitive::Bool(_) => kinds::BOOL,
            Primitive::Byte(_) => kinds::BYTE,
            Primitive::Int32(_) => kinds::INT32,
            Primitive::Int64(_) => kinds::INT64,
            Primitive::Float64(_) => kinds::FLOAT64,
        }
    }

    fn write_value(&self, wire: &mut WireWriter<'_>) -> WireResult<()> {
        match *self {
            Primitive::Bool(v) => wire.write_bool(v),
            Primitive::Byte(v) => wire.write_u8(v),
            Primitive::Int32(v) => wire.write_i32(v),
            Primitive::Int64(v) => wire.write_i64(v),
            Primitive::Float64(v) => wire.write_f64(v),
        }
    }

    fn read_value(kind: u8, wire: &mut WireReader<'_>) -> WireResult<Self> {
        match kind {
            kinds::BOOL => wire.read_bool().map(Primitive::Bool),
            kinds::BYTE => wire.read_u8().map(Primitive::Byte),
            kinds::INT32 => wire.read_i32().map(Primitive::Int32),
            kinds::INT64 => wire.read_i64().map(Primitive::Int64),
            kinds::FLOAT64 => wire.read_f64().map(Primitive::Float64),
            other => Err(WireError::malformed(format!("unknown primitive kind {other}"))),
        }
    }

    /// Integer value widened to i64, if this is an integer
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Primitive::Byte(v) => Some(i64::from(v)),
            Primitive::Int32(v) => Some(i64::from(v)),
            Primitive::Int64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Primitive::Float64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Primitive::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for Primitive {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Primitive::Bool(a), Primitive::Bool(b)) => a == b,
            (Primitive::Byte(a), Primitive::Byte(b)) => a == b,
            (Primitive::Int32(a), Primitive::Int32(b)) => a == b,
            (Primitive::Int64(a), Primitive::Int64(b)) => a == b,
            (Primitive::Float64(a), Primitive::Float64(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl From<bool> for Primitive {
    fn from(v: bool) -> Self {
        Primitive::Bool(v)
    }
}

impl From<u8> for Primitive {
    fn from(v: u8) -> Self {
        Primitive::Byte(v)
    }
}

impl From<i32> for Primitive {
    fn from(v: i32) -> Self {
        Primitive::Int32(v)
    }
}

impl From<i64> for Primitive {
    fn from(v: i64) -> Self {
        Primitive::Int64(v)
    }
}

impl From<f64> for Primitive {
    fn from(v: f64) -> Self {
        Primitive::Float64(v)
    }
}

/// Scalar value message: `[kind u8][value]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PrimitiveMessage {
    pub value: Primitive,
}

impl PrimitiveMessage {
    pub fn new(value: impl Into<Primitive>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl Payload for PrimitiveMessage {
    const TAG: u16 = tags::PRIMITIVE;
    const NAME: &'static str = "primitive";

    fn encode_payload(&self, writer: &mut MessageWriter<'_>) -> WireResult<()> {
        let wire = writer.wire();
        wire.write_u8(self.value.kind())?;
        self.value.write_value(wire)
    }

    fn decode_payload(reader: &mut MessageReader<'_>) -> WireResult<Self> {
        let wire = reader.wire();
        let kind = wire.read_u8()?;
        Primitive::read_value(kind, wire).map(|value| Self { value })
    }
}
