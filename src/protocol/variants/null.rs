use serde::Serialize;

use crate::protocol::{tags, MessageReader, MessageWriter, Payload, WireResult};

/// Explicit absence of a value
///
/// Carries no payload: the envelope alone says "null". All instances are equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct NullMessage;

impl NullMessage {
    pub const fn new() -> Self {
        NullMessage
    }
}

impl From<()> for NullMessage {
    fn from(_: ()) -> Self {
        NullMessage
    }
}

impl Payload for NullMessage {
    const TAG: u16 = tags::NULL;
    const NAME: &'static str = "null";

    fn encode_payload(&self, _writer: &mut MessageWriter<'_>) -> WireResult<()> {
        Ok(())
    }

    fn decode_payload(_reader: &mut MessageReader<'_>) -> WireResult<Self> {
        Ok(NullMessage)
    }
}
