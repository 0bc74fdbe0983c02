//! Protocol codec for encoding/decoding messages
//!
//! The envelope (magic + type tag) is written by [`write_envelope`] and parsed
//! by [`read_envelope`], and nowhere else. Variants only see their payload.

use bytes::{Buf, BytesMut};
use std::io::{Read, Write};
use std::sync::Arc;

use super::{
    Message, ProtocolError, TypeRegistry, WireError, WireReader, WireResult, WireWriter,
    DEFAULT_MAGIC, DEFAULT_MAX_DEPTH, DEFAULT_MAX_PAYLOAD_LEN,
};

/// Write the envelope header for a message of type `tag`
pub fn write_envelope(writer: &mut WireWriter<'_>, magic: u16, tag: u16) -> WireResult<()> {
    writer.write_u16(magic)?;
    writer.write_u16(tag)
}

/// Read and validate the envelope header, returning the type tag
pub fn read_envelope(reader: &mut WireReader<'_>, magic: u16) -> WireResult<u16> {
    let found = reader.read_u16()?;
    if found != magic {
        return Err(ProtocolError::BadMagic {
            expected: magic,
            found,
        }
        .into());
    }
    reader.read_u16()
}

/// Writes whole messages, envelope first, then the variant payload
pub struct MessageWriter<'a> {
    wire: WireWriter<'a>,
    magic: u16,
}

impl<'a> MessageWriter<'a> {
    pub fn new(inner: &'a mut dyn Write, codec: &Codec) -> Self {
        Self {
            wire: WireWriter::with_limit(inner, codec.max_payload_len),
            magic: codec.magic,
        }
    }

    /// Stream primitives for payload encoding
    pub fn wire(&mut self) -> &mut WireWriter<'a> {
        &mut self.wire
    }

    pub fn write_message(&mut self, message: &Message) -> WireResult<()> {
        message.validate()?;
        write_envelope(&mut self.wire, self.magic, message.type_tag())?;
        message.encode_payload(self)
    }
}

/// Reads whole messages, dispatching on the type tag through the registry
pub struct MessageReader<'a> {
    wire: WireReader<'a>,
    registry: &'a TypeRegistry,
    magic: u16,
    max_depth: usize,
    depth: usize,
}

impl<'a> MessageReader<'a> {
    pub fn new(inner: &'a mut dyn Read, codec: &'a Codec) -> Self {
        Self {
            wire: WireReader::with_limit(inner, codec.max_payload_len),
            registry: &codec.registry,
            magic: codec.magic,
            max_depth: codec.max_depth,
            depth: 0,
        }
    }

    /// Stream primitives for payload decoding
    pub fn wire(&mut self) -> &mut WireReader<'a> {
        &mut self.wire
    }

    /// Read one complete message: envelope, registry lookup, payload
    ///
    /// Also used by variants to read nested messages, bounded by the
    /// configured nesting depth.
    pub fn read_message(&mut self) -> WireResult<Message> {
        let tag = read_envelope(&mut self.wire, self.magic)?;

        let registry = self.registry;
        let entry = registry.get(tag).ok_or(ProtocolError::UnknownType(tag))?;

        if self.depth >= self.max_depth {
            return Err(WireError::malformed(format!(
                "messages nested deeper than {}",
                self.max_depth
            )));
        }

        self.depth += 1;
        let result = (entry.decode)(self);
        self.depth -= 1;
        result
    }
}

/// Outcome of decoding from a buffer that may hold only part of a message
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Message(Message),
    /// Nothing can be decoded until the buffer holds at least `needed` bytes
    Incomplete { needed: usize },
}

/// Encodes and decodes messages with a fixed magic, limits and registry
#[derive(Debug, Clone)]
pub struct Codec {
    magic: u16,
    max_payload_len: usize,
    max_depth: usize,
    registry: Arc<TypeRegistry>,
}

impl Codec {
    /// Codec with the default constants and the process-wide registry
    pub fn new() -> Self {
        Self::with_registry(TypeRegistry::global())
    }

    pub fn with_registry(registry: Arc<TypeRegistry>) -> Self {
        Self {
            magic: DEFAULT_MAGIC,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
            registry,
        }
    }

    pub fn with_magic(mut self, magic: u16) -> Self {
        self.magic = magic;
        self
    }

    pub fn with_max_payload_len(mut self, max_payload_len: usize) -> Self {
        self.max_payload_len = max_payload_len;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn magic(&self) -> u16 {
        self.magic
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Encode a message onto a blocking stream and flush it
    pub fn encode(&self, out: &mut dyn Write, message: &Message) -> WireResult<()> {
        let mut writer = MessageWriter::new(out, self);
        writer.write_message(message)?;
        writer.wire().flush()
    }

    pub fn encode_to_vec(&self, message: &Message) -> WireResult<Vec<u8>> {
        let mut out = Vec::new();
        self.encode(&mut out, message)?;
        Ok(out)
    }

    /// Append an encoded message to a buffer; nothing is appended on error
    pub fn encode_into(&self, message: &Message, buf: &mut BytesMut) -> WireResult<()> {
        let bytes = self.encode_to_vec(message)?;
        buf.extend_from_slice(&bytes);
        Ok(())
    }

    /// Decode one message from a blocking stream
    pub fn decode(&self, input: &mut dyn Read) -> WireResult<Message> {
        MessageReader::new(input, self).read_message().map_err(|e| {
            if e.is_protocol() {
                tracing::debug!(error = %e, "Failed to decode message");
            }
            e
        })
    }

    /// Decode one message from the front of `bytes`
    ///
    /// Returns the message and the number of bytes it occupied. A message cut
    /// short by the end of the slice is a malformed payload.
    pub fn decode_slice(&self, bytes: &[u8]) -> WireResult<(Message, usize)> {
        let mut cursor = bytes;
        match self.decode(&mut cursor) {
            Ok(message) => Ok((message, bytes.len() - cursor.len())),
            Err(e) if e.is_end_of_stream() => Err(WireError::malformed(format!(
                "message truncated at {} bytes",
                bytes.len()
            ))),
            Err(e) => Err(e),
        }
    }

    /// Decode a message from the front of the buffer, consuming it
    ///
    /// A partial message leaves the buffer untouched and reports how many
    /// bytes must be buffered before another attempt can get further.
    pub fn decode_buffered(&self, buf: &mut BytesMut) -> WireResult<Decoded> {
        let mut cursor: &[u8] = &buf[..];
        match self.decode(&mut cursor) {
            Ok(message) => {
                let consumed = buf.len() - cursor.len();
                buf.advance(consumed);
                Ok(Decoded::Message(message))
            }
            Err(e) if e.is_end_of_stream() => Ok(Decoded::Incomplete {
                needed: e.needed().unwrap_or(buf.len() + 1),
            }),
            Err(e) => Err(e),
        }
    }

    /// Attempt to decode a message from the buffer
    /// Returns Ok(None) if more data is needed; the buffer is left untouched
    pub fn try_decode(&self, buf: &mut BytesMut) -> WireResult<Option<Message>> {
        match self.decode_buffered(buf)? {
            Decoded::Message(message) => Ok(Some(message)),
            Decoded::Incomplete { .. } => Ok(None),
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}
