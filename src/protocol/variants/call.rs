//! Invocation requests and their results
//!
//! A call carries its arguments as nested messages, each with its own full
//! envelope, so any registered variant can be passed as an argument.

use serde::Serialize;

use crate::protocol::{
    tags, Message, MessageReader, MessageWriter, Payload, WireError, WireResult,
};

/// What the callee should do with the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CallKind {
    Construct = 0,
    Method = 1,
    GetProperty = 2,
    SetProperty = 3,
    /// Element `i` of an indexable object
    GetIndexed = 4,
}

impl CallKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CallKind::Construct),
            1 => Some(CallKind::Method),
            2 => Some(CallKind::GetProperty),
            3 => Some(CallKind::SetProperty),
            4 => Some(CallKind::GetIndexed),
            _ => None,
        }
    }
}

/// Receiver of a call: a class (static members, constructors) or a live object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallTarget {
    Class(String),
    Object(i32),
}

const TARGET_CLASS: u8 = 0;
const TARGET_OBJECT: u8 = 1;

/// Request to construct an object, invoke a member or access a property
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallMessage {
    pub kind: CallKind,
    pub target: CallTarget,
    /// Method or property name; empty for constructors and indexed gets
    pub member: String,
    pub args: Vec<Message>,
}

impl CallMessage {
    pub fn construct(class_name: impl Into<String>, args: Vec<Message>) -> Self {
        Self {
            kind: CallKind::Construct,
            target: CallTarget::Class(class_name.into()),
            member: String::new(),
            args,
        }
    }

    pub fn static_method(
        class_name: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Message>,
    ) -> Self {
        Self {
            kind: CallKind::Method,
            target: CallTarget::Class(class_name.into()),
            member: method.into(),
            args,
        }
    }

    pub fn method(handle: i32, method: impl Into<String>, args: Vec<Message>) -> Self {
        Self {
            kind: CallKind::Method,
            target: CallTarget::Object(handle),
            member: method.into(),
            args,
        }
    }

    pub fn get_property(handle: i32, property: impl Into<String>) -> Self {
        Self {
            kind: CallKind::GetProperty,
            target: CallTarget::Object(handle),
            member: property.into(),
            args: Vec::new(),
        }
    }

    pub fn set_property(
        handle: i32,
        property: impl Into<String>,
        value: impl Into<Message>,
    ) -> Self {
        Self {
            kind: CallKind::SetProperty,
            target: CallTarget::Object(handle),
            member: property.into(),
            args: vec![value.into()],
        }
    }

    pub fn get_indexed(handle: i32, index: i32) -> Self {
        Self {
            kind: CallKind::GetIndexed,
            target: CallTarget::Object(handle),
            member: String::new(),
            args: vec![Message::from(index)],
        }
    }

    /// Check the argument shape against the call kind
    pub fn validate(&self) -> WireResult<()> {
        match (self.kind, &self.target, self.args.len()) {
            (CallKind::Construct, CallTarget::Object(_), _) => {
                Err(WireError::malformed("constructor call targets an object handle"))
            }
            (CallKind::GetIndexed, CallTarget::Class(_), _) => {
                Err(WireError::malformed("indexed get targets a class"))
            }
            (CallKind::GetIndexed, _, n) if n != 1 => Err(WireError::malformed(format!(
                "indexed get carries {n} arguments, expected 1"
            ))),
            (CallKind::GetProperty, _, n) if n != 0 => Err(WireError::malformed(format!(
                "property get carries {n} arguments"
            ))),
            (CallKind::SetProperty, _, n) if n != 1 => Err(WireError::malformed(format!(
                "property set carries {n} arguments, expected 1"
            ))),
            _ => Ok(()),
        }
    }
}

impl Payload for CallMessage {
    const TAG: u16 = tags::CALL;
    const NAME: &'static str = "call";

    fn encode_payload(&self, writer: &mut MessageWriter<'_>) -> WireResult<()> {
        let wire = writer.wire();
        wire.write_u8(self.kind as u8)?;
        match &self.target {
            CallTarget::Class(name) => {
                wire.write_u8(TARGET_CLASS)?;
                wire.write_string(name)?;
            }
            CallTarget::Object(handle) => {
                wire.write_u8(TARGET_OBJECT)?;
                wire.write_i32(*handle)?;
            }
        }
        wire.write_string(&self.member)?;
        wire.write_count(self.args.len())?;

        for arg in &self.args {
            writer.write_message(arg)?;
        }
        Ok(())
    }

    fn decode_payload(reader: &mut MessageReader<'_>) -> WireResult<Self> {
        let wire = reader.wire();
        let raw_kind = wire.read_u8()?;
        let kind = CallKind::from_u8(raw_kind)
            .ok_or_else(|| WireError::malformed(format!("unknown call kind {raw_kind}")))?;

        let target = match wire.read_u8()? {
            TARGET_CLASS => CallTarget::Class(wire.read_string()?),
            TARGET_OBJECT => CallTarget::Object(wire.read_i32()?),
            other => return Err(WireError::malformed(format!("unknown call target {other}"))),
        };
        let member = wire.read_string()?;
        let argc = wire.read_count()?;

        let mut args = Vec::with_capacity(argc.min(64));
        for _ in 0..argc {
            args.push(reader.read_message()?);
        }

        let call = Self {
            kind,
            target,
            member,
            args,
        };
        call.validate()?;
        Ok(call)
    }
}

/// Result of a call, wrapping the returned value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ReturnMessage {
    pub value: Box<Message>,
}

impl ReturnMessage {
    pub fn new(value: impl Into<Message>) -> Self {
        Self {
            value: Box::new(value.into()),
        }
    }
}

impl Payload for ReturnMessage {
    const TAG: u16 = tags::RETURN;
    const NAME: &'static str = "return";

    fn encode_payload(&self, writer: &mut MessageWriter<'_>) -> WireResult<()> {
        writer.write_message(&self.value)
    }

    fn decode_payload(reader: &mut MessageReader<'_>) -> WireResult<Self> {
        let value = reader.read_message()?;
        Ok(Self {
            value: Box::new(value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Codec, ErrorClass, ProtocolError, DEFAULT_MAGIC};

    fn encode_call(call: &CallMessage) -> Vec<u8> {
        Codec::new().encode_to_vec(&Message::Call(call.clone())).unwrap()
    }

    /// Encode a valid call, then overwrite its kind byte on the wire
    fn encode_with_kind(call: &CallMessage, kind: CallKind) -> Vec<u8> {
        let mut bytes = encode_call(call);
        bytes[4] = kind as u8;
        bytes
    }

    #[test]
    fn test_nested_arguments_keep_order() {
        let call = CallMessage::static_method(
            "System.String",
            "Join",
            vec![
                Message::from(","),
                Message::from(crate::protocol::ArrayValue::String(vec![
                    "a".into(),
                    "b".into(),
                ])),
                Message::null(),
            ],
        );
        let codec = Codec::new();
        let (decoded, _) = codec.decode_slice(&encode_call(&call)).unwrap();
        match decoded {
            Message::Call(c) => {
                assert_eq!(c.member, "Join");
                assert_eq!(c.args.len(), 3);
                assert!(c.args[2].is_null());
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_constructor_on_handle_is_malformed() {
        let bytes = encode_with_kind(&CallMessage::method(5, "", vec![]), CallKind::Construct);
        let err = Codec::new().decode_slice(&bytes).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Corrupt);
    }

    #[test]
    fn test_set_property_needs_one_value() {
        let two_args = CallMessage::method(1, "Name", vec![Message::from("x"), Message::null()]);
        let bytes = encode_with_kind(&two_args, CallKind::SetProperty);
        let err = Codec::new().decode_slice(&bytes).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Corrupt);
    }

    #[test]
    fn test_invalid_call_is_rejected_before_writing() {
        let mut bad = CallMessage::set_property(1, "Name", "x");
        bad.args.push(Message::null());

        let mut out = Vec::new();
        let err = Codec::new().encode(&mut out, &bad.into()).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Corrupt);
        assert!(out.is_empty());

        let mut on_class = CallMessage::get_indexed(1, 0);
        on_class.target = CallTarget::Class("System.Array".into());
        let nested: Message = ReturnMessage::new(on_class).into();
        let mut buf = bytes::BytesMut::new();
        assert!(Codec::new().encode_into(&nested, &mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_get_indexed_roundtrip() {
        let call = CallMessage::get_indexed(12, 3);
        assert_eq!(call.kind, CallKind::GetIndexed);
        assert_eq!(call.args, vec![Message::from(3)]);

        let bytes = encode_call(&call);
        assert_eq!(bytes[4], 4);
        let (decoded, _) = Codec::new().decode_slice(&bytes).unwrap();
        assert_eq!(decoded, Message::Call(call));
    }

    #[test]
    fn test_get_indexed_argument_count() {
        let no_args = CallMessage::method(12, "", vec![]);
        let err = Codec::new()
            .decode_slice(&encode_with_kind(&no_args, CallKind::GetIndexed))
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Corrupt);

        let two_args = CallMessage::method(12, "", vec![Message::from(0), Message::from(1)]);
        let err = Codec::new()
            .decode_slice(&encode_with_kind(&two_args, CallKind::GetIndexed))
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Corrupt);
    }

    #[test]
    fn test_get_indexed_on_class_is_malformed() {
        let static_call = CallMessage::static_method("System.Array", "", vec![Message::from(0)]);
        let err = Codec::new()
            .decode_slice(&encode_with_kind(&static_call, CallKind::GetIndexed))
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Corrupt);
    }

    #[test]
    fn test_unknown_tag_inside_arguments() {
        let mut bytes = DEFAULT_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&tags::CALL.to_le_bytes());
        bytes.push(CallKind::Method as u8);
        bytes.push(TARGET_OBJECT);
        bytes.extend_from_slice(&9i32.to_le_bytes());
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.push(b'f');
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&DEFAULT_MAGIC.to_le_bytes());
        bytes.extend_from_slice(&500u16.to_le_bytes());

        let err = Codec::new().decode_slice(&bytes).unwrap_err();
        assert!(matches!(
            err,
            WireError::Protocol(ProtocolError::UnknownType(500))
        ));
    }

    #[test]
    fn test_return_wraps_value() {
        let ret = ReturnMessage::new(2.5);
        assert_eq!(*ret.value, Message::from(2.5));
    }
}
