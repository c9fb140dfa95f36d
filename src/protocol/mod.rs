//! Frame-level protocol types consumed by the extension.
//!
//! Only the parsed, in-memory representation lives here. Serializing frames
//! to and from the wire is the connection layer's concern.

pub mod frame;
pub mod opcode;

pub use frame::Frame;
pub use opcode::OpCode;
