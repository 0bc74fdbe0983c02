use serde::Serialize;

use crate::protocol::{tags, MessageReader, MessageWriter, Payload, WireResult};

/// Reference to an object living in the runtime that issued `handle`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectMessage {
    pub handle: i32,
    pub class_name: String,
}

impl ObjectMessage {
    pub fn new(handle: i32, class_name: impl Into<String>) -> Self {
        Self {
            handle,
            class_name: class_name.into(),
        }
    }
}

impl Payload for ObjectMessage {
    const TAG: u16 = tags::OBJECT;
    const NAME: &'static str = "object";

    fn encode_payload(&self, writer: &mut MessageWriter<'_>) -> WireResult<()> {
        let wire = writer.wire();
        wire.write_i32(self.handle)?;
        wire.write_string(&self.class_name)
    }

    fn decode_payload(reader: &mut MessageReader<'_>) -> WireResult<Self> {
        let wire = reader.wire();
        let handle = wire.read_i32()?;
        let class_name = wire.read_string()?;
        Ok(Self { handle, class_name })
    }
}

/// Tells the owning runtime that a handle is no longer referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ReleaseMessage {
    pub handle: i32,
}

impl ReleaseMessage {
    pub fn new(handle: i32) -> Self {
        Self { handle }
    }
}

impl From<&ObjectMessage> for ReleaseMessage {
    fn from(object: &ObjectMessage) -> Self {
        Self::new(object.handle)
    }
}

impl Payload for ReleaseMessage {
    const TAG: u16 = tags::RELEASE;
    const NAME: &'static str = "release";

    fn encode_payload(&self, writer: &mut MessageWriter<'_>) -> WireResult<()> {
        writer.wire().write_i32(self.handle)
    }

    fn decode_payload(reader: &mut MessageReader<'_>) -> WireResult<Self> {
        reader.wire().read_i32().map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Codec, Message};

    #[test]
    fn test_release_from_object() {
        let object = ObjectMessage::new(12, "System.IO.MemoryStream");
        assert_eq!(ReleaseMessage::from(&object).handle, 12);
    }

    #[test]
    fn test_object_payload_size() {
        let bytes = Codec::new()
            .encode_to_vec(&Message::from(ObjectMessage::new(1, "A")))
            .unwrap();
        // envelope + handle + length prefix + "A"
        assert_eq!(bytes.len(), 4 + 4 + 4 + 1);
    }
}
