//! Bridgewire - typed value exchange between two runtimes
//!
//! Every value crosses the bridge as a self-describing message: a fixed
//! envelope (magic + type tag) followed by a payload owned by the variant.
//! The [`protocol`] module holds the codec and registry, [`network`] carries
//! messages over TCP and [`config`] loads the shared constants.

pub mod config;
pub mod network;
pub mod protocol;

pub use protocol::{Codec, Message, TypeRegistry, WireError};
