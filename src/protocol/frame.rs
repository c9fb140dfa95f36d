//! In-memory WebSocket frame representation.
//!
//! Extensions transform frames between parsing and message assembly, so the
//! model here is the parsed frame: flags, opcode, and payload bytes. Two
//! frames are equal when all fields are equal, payload included.

use bytes::Bytes;

use crate::protocol::OpCode;

/// A single WebSocket frame (RFC 6455).
///
/// A message is one final frame optionally preceded by non-final fragments;
/// `fin` marks the last fragment. The `rsv1` bit is owned by the
/// permessage-deflate extension and signals a compressed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag. True if this is the last fragment of a message.
    pub fin: bool,
    /// Reserved bit 1. Set by the compression extension on transformed frames.
    pub rsv1: bool,
    /// Reserved bit 2. Unused unless another extension is negotiated.
    pub rsv2: bool,
    /// Reserved bit 3. Unused unless another extension is negotiated.
    pub rsv3: bool,
    /// Frame opcode defining the interpretation of the payload.
    pub opcode: OpCode,
    payload: Bytes,
}

impl Frame {
    /// Create a new frame with the given parameters.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            payload: payload.into(),
        }
    }

    /// Create an unfragmented text frame.
    #[must_use]
    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Text, data)
    }

    /// Create an unfragmented binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Binary, data)
    }

    /// Create a close frame with optional status code and reason.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let payload = if let Some(code) = code {
            let mut data = code.to_be_bytes().to_vec();
            data.extend_from_slice(reason.as_bytes());
            data
        } else {
            Vec::new()
        };
        Self::new(true, OpCode::Close, payload)
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Ping, data)
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, data)
    }

    /// Get the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Replace the payload, leaving every other field untouched.
    pub fn set_payload(&mut self, payload: impl Into<Bytes>) {
        self.payload = payload.into();
    }
}
