use serde::Serialize;
use thiserror::Error;

use crate::protocol::{tags, MessageReader, MessageWriter, Payload, WireResult};

/// Exception raised in the remote runtime while serving a call
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{class_name}: {message}")]
pub struct ExceptionMessage {
    pub class_name: String,
    pub message: String,
}

impl ExceptionMessage {
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
        }
    }
}

impl Payload for ExceptionMessage {
    const TAG: u16 = tags::EXCEPTION;
    const NAME: &'static str = "exception";

    fn encode_payload(&self, writer: &mut MessageWriter<'_>) -> WireResult<()> {
        let wire = writer.wire();
        wire.write_string(&self.class_name)?;
        wire.write_string(&self.message)
    }

    fn decode_payload(reader: &mut MessageReader<'_>) -> WireResult<Self> {
        let wire = reader.wire();
        let class_name = wire.read_string()?;
        let message = wire.read_string()?;
        Ok(Self {
            class_name,
            message,
        })
    }
}
