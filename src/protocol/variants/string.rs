use serde::Serialize;

use crate::protocol::{tags, MessageReader, MessageWriter, Payload, WireResult};

/// UTF-8 string message: `[len i32][bytes]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StringMessage {
    pub value: String,
}

impl StringMessage {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl Payload for StringMessage {
    const TAG: u16 = tags::STRING;
    const NAME: &'static str = "string";

    fn encode_payload(&self, writer: &mut MessageWriter<'_>) -> WireResult<()> {
        writer.wire().write_string(&self.value)
    }

    fn decode_payload(reader: &mut MessageReader<'_>) -> WireResult<Self> {
        reader.wire().read_string().map(|value| Self { value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Codec, ErrorClass, Message, DEFAULT_MAGIC};

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let mut bytes = DEFAULT_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&tags::STRING.to_le_bytes());
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.extend_from_slice(&[0xC3, 0x28]);

        let err = Codec::new().decode_slice(&bytes).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Corrupt);
    }

    #[test]
    fn test_empty_string_is_not_null() {
        let codec = Codec::new();
        let bytes = codec.encode_to_vec(&Message::from("")).unwrap();
        let (decoded, _) = codec.decode_slice(&bytes).unwrap();
        assert!(!decoded.is_null());
        match decoded {
            Message::String(s) => assert_eq!(s.as_str(), ""),
            other => panic!("Wrong message type: {:?}", other),
        }
    }
}
