//! # wsflate - permessage-deflate for WebSocket frames
//!
//! `wsflate` implements the Compression Extensions for WebSocket
//! (RFC 7692): outgoing data-frame payloads are compressed against a
//! sliding window shared across messages, incoming frames are restored, and
//! control frames pass through untouched. Round-trips are exact,
//! byte-for-byte, across arbitrarily fragmented messages.
//!
//! ## Features
//!
//! - **Context takeover** with per-direction windows, including the
//!   `no_context_takeover` per-message reset policies
//! - **Full parameter negotiation** for both client and server roles
//!   (`Sec-WebSocket-Extensions` parameters, window-bits clamping)
//! - **Synchronous, allocation-light core** driven by the connection layer;
//!   no runtime dependency
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsflate::{DeflateConfig, DeflateExtension, Extension, Frame};
//!
//! // Server side: resolve a client's offer, then transform frames.
//! let mut ext = DeflateExtension::server(DeflateConfig::default());
//! let response = ext.negotiate(&client_params)?;
//! ext.encode(&mut outgoing_frame)?;
//! ext.decode(&mut incoming_frame)?;
//! ```

pub mod error;
pub mod extensions;
pub mod protocol;

pub use error::{Error, Result};
pub use extensions::deflate::{
    DeflateConfig, DeflateExtension, DeflateParams, PerMessageDeflate, Role,
};
pub use extensions::{Extension, ExtensionOffer, ExtensionParam, RsvBits};
pub use protocol::{Frame, OpCode};
