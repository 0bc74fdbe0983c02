use serde::Serialize;

use super::kinds;
use crate::protocol::{
    tags, MessageReader, MessageWriter, Payload, WireError, WireReader, WireResult,
};

/// Homogeneous array of scalars or strings
///
/// Float elements compare by bit pattern, like [`Primitive`](super::Primitive).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum ArrayValue {
    Bool(Vec<bool>),
    Byte(Vec<u8>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    String(Vec<String>),
}

impl ArrayValue {
    pub fn kind(&self) -> u8 {
        match self {
            ArrayValue::Bool(_) => kinds::BOOL,
            ArrayValue::Byte(_) => kinds::BYTE,
            ArrayValue::Int32(_) => kinds::INT32,
            ArrayValue::Int64(_) => kinds::INT64,
            ArrayValue::Float64(_) => kinds::FLOAT64,
            ArrayValue::String(_) => kinds::STRING,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayValue::Bool(v) => v.len(),
            ArrayValue::Byte(v) => v.len(),
            ArrayValue::Int32(v) => v.len(),
            ArrayValue::Int64(v) => v.len(),
            ArrayValue::Float64(v) => v.len(),
            ArrayValue::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PartialEq for ArrayValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ArrayValue::Bool(a), ArrayValue::Bool(b)) => a == b,
            (ArrayValue::Byte(a), ArrayValue::Byte(b)) => a == b,
            (ArrayValue::Int32(a), ArrayValue::Int32(b)) => a == b,
            (ArrayValue::Int64(a), ArrayValue::Int64(b)) => a == b,
            (ArrayValue::Float64(a), ArrayValue::Float64(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (ArrayValue::String(a), ArrayValue::String(b)) => a == b,
            _ => false,
        }
    }
}

/// Read `count` fixed-width elements as one block, so a short buffer reports
/// the full block length as missing
fn read_fixed<T, const N: usize>(
    wire: &mut WireReader<'_>,
    count: usize,
    parse: impl Fn([u8; N]) -> WireResult<T>,
) -> WireResult<Vec<T>> {
    let len = count
        .checked_mul(N)
        .ok_or_else(|| WireError::malformed(format!("array of {count} elements overflows")))?;
    let bytes = wire.read_bytes(len)?;
    bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut raw = [0u8; N];
            raw.copy_from_slice(chunk);
            parse(raw)
        })
        .collect()
}

fn read_elements<T>(
    wire: &mut WireReader<'_>,
    count: usize,
    read: impl Fn(&mut WireReader<'_>) -> WireResult<T>,
) -> WireResult<Vec<T>> {
    let mut values = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        values.push(read(wire)?);
    }
    Ok(values)
}

/// Array message: `[element kind u8][count i32][elements]`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ArrayMessage {
    pub value: ArrayValue,
}

impl ArrayMessage {
    pub fn new(value: ArrayValue) -> Self {
        Self { value }
    }
}

impl Payload for ArrayMessage {
    const TAG: u16 = tags::ARRAY;
    const NAME: &'static str = "array";

    fn encode_payload(&self, writer: &mut MessageWriter<'_>) -> WireResult<()> {
        let wire = writer.wire();
        wire.write_u8(self.value.kind())?;
        wire.write_count(self.value.len())?;
        match &self.value {
            ArrayValue::Bool(values) => values.iter().try_for_each(|v| wire.write_bool(*v)),
            ArrayValue::Byte(values) => wire.write_bytes(values),
            ArrayValue::Int32(values) => values.iter().try_for_each(|v| wire.write_i32(*v)),
            ArrayValue::Int64(values) => values.iter().try_for_each(|v| wire.write_i64(*v)),
            ArrayValue::Float64(values) => values.iter().try_for_each(|v| wire.write_f64(*v)),
            ArrayValue::String(values) => values.iter().try_for_each(|v| wire.write_string(v)),
        }
    }

    fn decode_payload(reader: &mut MessageReader<'_>) -> WireResult<Self> {
        let wire = reader.wire();
        let kind = wire.read_u8()?;
        let count = wire.read_count()?;

        let value = match kind {
            kinds::BOOL => ArrayValue::Bool(read_fixed(wire, count, |[b]: [u8; 1]| match b {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(WireError::malformed(format!("invalid bool byte {other:#04x}"))),
            })?),
            kinds::BYTE => ArrayValue::Byte(wire.read_bytes(count)?),
            kinds::INT32 => {
                ArrayValue::Int32(read_fixed(wire, count, |b| Ok(i32::from_le_bytes(b)))?)
            }
            kinds::INT64 => {
                ArrayValue::Int64(read_fixed(wire, count, |b| Ok(i64::from_le_bytes(b)))?)
            }
            kinds::FLOAT64 => {
                ArrayValue::Float64(read_fixed(wire, count, |b| Ok(f64::from_le_bytes(b)))?)
            }
            kinds::STRING => ArrayValue::String(read_elements(wire, count, |w| w.read_string())?),
            other => {
                return Err(WireError::malformed(format!("unknown array element kind {other}")))
            }
        };
        Ok(Self { value })
    }
}
