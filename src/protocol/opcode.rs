//! WebSocket frame opcodes as defined in RFC 6455.

/// WebSocket frame opcode.
///
/// Defines the interpretation of the payload data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[non_exhaustive]
pub enum OpCode {
    /// Continuation frame (0x0), carrying a later fragment of a message.
    Continuation = 0x0,

    /// Text frame (0x1). Payload must be valid UTF-8 once reassembled.
    Text = 0x1,

    /// Binary frame (0x2).
    Binary = 0x2,

    /// Close frame (0x8). May contain a status code and reason.
    Close = 0x8,

    /// Ping frame (0x9).
    Ping = 0x9,

    /// Pong frame (0xA).
    Pong = 0xA,
}

impl OpCode {
    /// Check if this is a control frame opcode.
    ///
    /// Control frames: Close (0x8), Ping (0x9), Pong (0xA).
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }

    /// Check if this is a data frame opcode.
    ///
    /// Data frames: Continuation (0x0), Text (0x1), Binary (0x2).
    #[inline]
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(self, OpCode::Continuation | OpCode::Text | OpCode::Binary)
    }

    /// Get a human-readable name for this opcode.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            OpCode::Continuation => "Continuation",
            OpCode::Text => "Text",
            OpCode::Binary => "Binary",
            OpCode::Close => "Close",
            OpCode::Ping => "Ping",
            OpCode::Pong => "Pong",
        }
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
