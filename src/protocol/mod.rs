//! Protocol module - Defines the wire protocol for bridge value exchange
//!
//! Every message uses the same binary envelope, all integers little-endian:
//! - 2 bytes magic
//! - 2 bytes type tag
//! - Variable length payload, self-delimiting and owned by the variant
//!
//! The type tag selects the variant through the [`TypeRegistry`]; the
//! variant's payload codec consumes exactly the bytes it wrote.

mod codec;
mod error;
mod io;
mod message;
mod registry;
pub mod variants;

pub use codec::*;
pub use error::*;
pub use io::*;
pub use message::*;
pub use registry::*;
pub use variants::*;

/// Protocol version, bumped whenever the magic, tag width or tag numbering changes
pub const PROTOCOL_VERSION: u32 = 1;

/// Default port for bridge communication
pub const DEFAULT_PORT: u16 = 56789;

/// Default envelope sentinel; both runtimes must agree on it
pub const DEFAULT_MAGIC: u16 = 0xD00D;

/// Width of the type tag on the wire, in bytes
pub const TAG_WIDTH: usize = 2;

/// Size of the envelope: magic(2) + tag(2)
pub const ENVELOPE_SIZE: usize = 2 + TAG_WIDTH;

/// Maximum length prefix accepted by default (10 MB)
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 10 * 1024 * 1024;

/// Maximum nesting of messages inside messages (call arguments, return values)
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Type tags of the built-in variants
pub mod tags {
    pub const NULL: u16 = 0;
    pub const PRIMITIVE: u16 = 1;
    pub const STRING: u16 = 2;
    pub const ARRAY: u16 = 3;
    pub const OBJECT: u16 = 4;
    pub const RELEASE: u16 = 5;
    pub const EXCEPTION: u16 = 6;
    pub const CALL: u16 = 7;
    pub const RETURN: u16 = 8;
}
