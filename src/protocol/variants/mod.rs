//! Concrete message variants
//!
//! Each variant implements [`Payload`](super::Payload) and is registered
//! under exactly one type tag in the standard registry.

mod array;
mod call;
mod exception;
mod null;
mod object;
mod primitive;
mod string;

pub use array::*;
pub use call::*;
pub use exception::*;
pub use null::*;
pub use object::*;
pub use primitive::*;
pub use string::*;
