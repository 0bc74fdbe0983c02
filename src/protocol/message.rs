//! Protocol message definitions
//!
//! [`Message`] is the closed set of values the bridge exchanges. Each variant
//! wraps a payload type implementing [`Payload`], which owns only the payload
//! bytes; the envelope is written and parsed by the codec.

use serde::Serialize;

use super::{
    ArrayMessage, ArrayValue, CallMessage, ExceptionMessage, MessageReader, MessageWriter,
    NullMessage, ObjectMessage, Primitive, PrimitiveMessage, ReleaseMessage, ReturnMessage,
    StringMessage, WireResult,
};

/// Payload codec of one concrete message variant
pub trait Payload: Sized {
    /// Type tag written in the envelope ahead of this payload
    const TAG: u16;
    /// Human-readable variant name, used in logs and registry listings
    const NAME: &'static str;

    /// Write the payload; the envelope has already been written
    fn encode_payload(&self, writer: &mut MessageWriter<'_>) -> WireResult<()>;

    /// Read the payload; the envelope has already been consumed
    fn decode_payload(reader: &mut MessageReader<'_>) -> WireResult<Self>;
}

/// A typed value in transit between the two runtimes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Message {
    Null(NullMessage),
    Primitive(PrimitiveMessage),
    String(StringMessage),
    Array(ArrayMessage),
    Object(ObjectMessage),
    Release(ReleaseMessage),
    Exception(ExceptionMessage),
    Call(CallMessage),
    Return(ReturnMessage),
}

impl Message {
    pub fn null() -> Self {
        Message::Null(NullMessage::new())
    }

    /// Get the type tag of the concrete variant
    pub fn type_tag(&self) -> u16 {
        match self {
            Message::Null(_) => NullMessage::TAG,
            Message::Primitive(_) => PrimitiveMessage::TAG,
            Message::String(_) => StringMessage::TAG,
            Message::Array(_) => ArrayMessage::TAG,
            Message::Object(_) => ObjectMessage::TAG,
            Message::Release(_) => ReleaseMessage::TAG,
            Message::Exception(_) => ExceptionMessage::TAG,
            Message::Call(_) => CallMessage::TAG,
            Message::Return(_) => ReturnMessage::TAG,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Null(_) => NullMessage::NAME,
            Message::Primitive(_) => PrimitiveMessage::NAME,
            Message::String(_) => StringMessage::NAME,
            Message::Array(_) => ArrayMessage::NAME,
            Message::Object(_) => ObjectMessage::NAME,
            Message::Release(_) => ReleaseMessage::NAME,
            Message::Exception(_) => ExceptionMessage::NAME,
            Message::Call(_) => CallMessage::NAME,
            Message::Return(_) => ReturnMessage::NAME,
        }
    }

    /// Write the payload of the concrete variant
    pub fn encode_payload(&self, writer: &mut MessageWriter<'_>) -> WireResult<()> {
        match self {
            Message::Null(m) => m.encode_payload(writer),
            Message::Primitive(m) => m.encode_payload(writer),
            Message::String(m) => m.encode_payload(writer),
            Message::Array(m) => m.encode_payload(writer),
            Message::Object(m) => m.encode_payload(writer),
            Message::Release(m) => m.encode_payload(writer),
            Message::Exception(m) => m.encode_payload(writer),
            Message::Call(m) => m.encode_payload(writer),
            Message::Return(m) => m.encode_payload(writer),
        }
    }

    /// Reject messages the peer's decoder would refuse
    pub fn validate(&self) -> WireResult<()> {
        match self {
            Message::Call(call) => call.validate(),
            _ => Ok(()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Message::Null(_))
    }

    /// Unwrap return values and surface remote exceptions as errors
    pub fn into_result(self) -> Result<Message, ExceptionMessage> {
        match self {
            Message::Exception(e) => Err(e),
            Message::Return(r) => (*r.value).into_result(),
            other => Ok(other),
        }
    }
}

impl From<NullMessage> for Message {
    fn from(m: NullMessage) -> Self {
        Message::Null(m)
    }
}

impl From<PrimitiveMessage> for Message {
    fn from(m: PrimitiveMessage) -> Self {
        Message::Primitive(m)
    }
}

impl From<StringMessage> for Message {
    fn from(m: StringMessage) -> Self {
        Message::String(m)
    }
}

impl From<ArrayMessage> for Message {
    fn from(m: ArrayMessage) -> Self {
        Message::Array(m)
    }
}

impl From<ObjectMessage> for Message {
    fn from(m: ObjectMessage) -> Self {
        Message::Object(m)
    }
}

impl From<ReleaseMessage> for Message {
    fn from(m: ReleaseMessage) -> Self {
        Message::Release(m)
    }
}

impl From<ExceptionMessage> for Message {
    fn from(m: ExceptionMessage) -> Self {
        Message::Exception(m)
    }
}

impl From<CallMessage> for Message {
    fn from(m: CallMessage) -> Self {
        Message::Call(m)
    }
}

impl From<ReturnMessage> for Message {
    fn from(m: ReturnMessage) -> Self {
        Message::Return(m)
    }
}

impl From<Primitive> for Message {
    fn from(value: Primitive) -> Self {
        Message::Primitive(PrimitiveMessage::new(value))
    }
}

impl From<bool> for Message {
    fn from(value: bool) -> Self {
        Primitive::Bool(value).into()
    }
}

impl From<u8> for Message {
    fn from(value: u8) -> Self {
        Primitive::Byte(value).into()
    }
}

impl From<i32> for Message {
    fn from(value: i32) -> Self {
        Primitive::Int32(value).into()
    }
}

impl From<i64> for Message {
    fn from(value: i64) -> Self {
        Primitive::Int64(value).into()
    }
}

impl From<f64> for Message {
    fn from(value: f64) -> Self {
        Primitive::Float64(value).into()
    }
}

impl From<&str> for Message {
    fn from(value: &str) -> Self {
        Message::String(StringMessage::new(value))
    }
}

impl From<String> for Message {
    fn from(value: String) -> Self {
        Message::String(StringMessage::new(value))
    }
}

impl From<ArrayValue> for Message {
    fn from(value: ArrayValue) -> Self {
        Message::Array(ArrayMessage::new(value))
    }
}

impl<T: Into<Message>> From<Option<T>> for Message {
    fn from(value: Option<T>) -> Self {
        value.map_or_else(Message::null, Into::into)
    }
}
