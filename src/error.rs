//! Error types for the permessage-deflate extension.

use thiserror::Error;

/// Result type alias for extension operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring, negotiating, or applying the
/// extension.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Invalid extension configuration or negotiation failure.
    ///
    /// Raised at construction or handshake time; the extension must not be
    /// used for frame traffic afterwards.
    #[error("Invalid extension: {0}")]
    InvalidExtension(String),

    /// The compression engine failed.
    #[error("Compression failed: {0}")]
    Compression(String),

    /// The decompression engine rejected the byte stream.
    ///
    /// Either the compressed data is malformed, or it contains a backward
    /// reference beyond the retained window history, which is what a
    /// context-takeover policy mismatch between the two peers looks like.
    /// The engine state is indeterminate afterwards; the caller should
    /// treat the connection as failed rather than retry.
    #[error("Decompression failed: {0}")]
    Decompression(String),
}
