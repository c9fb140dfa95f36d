//! WebSocket extension framework (RFC 6455 section 9).
//!
//! An [`Extension`] transforms frames on their way out (`encode`) and on
//! their way in (`decode`), and takes part in the handshake by negotiating
//! parameters. The connection layer parses `Sec-WebSocket-Extensions`
//! headers into [`ExtensionOffer`] values, hands the parameters to the
//! extension, and applies the extension to every data frame it sends or
//! receives.

pub mod context;
pub mod deflate;

use std::fmt;

use crate::error::{Error, Result};
use crate::protocol::Frame;

/// A single extension parameter: a name with an optional value.
///
/// On the wire, parameters are semicolon-separated after the extension
/// name, e.g. `permessage-deflate; server_max_window_bits=12;
/// client_no_context_takeover`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionParam {
    /// Parameter name (e.g. "client_max_window_bits").
    pub name: String,
    /// Parameter value; `None` for presence-only flags.
    pub value: Option<String>,
}

impl ExtensionParam {
    /// Create a parameter with a value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Create a presence-only flag parameter.
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    /// Parse one `name` or `name=value` fragment.
    pub fn parse(s: &str) -> Self {
        match s.trim().split_once('=') {
            Some((name, value)) => Self {
                name: name.trim().to_string(),
                value: Some(value.trim().trim_matches('"').to_string()),
            },
            None => Self::flag(s.trim()),
        }
    }
}

impl fmt::Display for ExtensionParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}={}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

/// One extension entry of a `Sec-WebSocket-Extensions` header: the
/// extension name plus its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionOffer {
    /// Extension name (e.g. "permessage-deflate").
    pub name: String,
    /// Extension parameters, in header order.
    pub params: Vec<ExtensionParam>,
}

impl ExtensionOffer {
    /// Create an offer with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Create an offer with parameters.
    pub fn with_params(name: impl Into<String>, params: Vec<ExtensionParam>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Parse a single `extension-name; param1=value1; param2` entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidExtension`] when the extension name is empty.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split(';');
        let name = parts.next().unwrap_or("").trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidExtension("Empty extension name".into()));
        }

        Ok(Self {
            name,
            params: parts.map(ExtensionParam::parse).collect(),
        })
    }

    /// Parse a full header value: comma-separated extension entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidExtension`] when any entry is invalid.
    pub fn parse_header(header: &str) -> Result<Vec<Self>> {
        header.split(',').map(|s| Self::parse(s.trim())).collect()
    }

    /// Look up a parameter by name.
    pub fn get_param(&self, name: &str) -> Option<&ExtensionParam> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Check whether a parameter is present.
    pub fn has_param(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }
}

impl fmt::Display for ExtensionOffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for param in &self.params {
            write!(f, "; {}", param)?;
        }
        Ok(())
    }
}

/// RSV bit usage declared by an extension.
///
/// The connection layer uses this to reject frames that set reserved bits
/// no negotiated extension claims.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RsvBits {
    /// Extension uses the RSV1 bit (permessage-deflate does).
    pub rsv1: bool,
    /// Extension uses the RSV2 bit.
    pub rsv2: bool,
    /// Extension uses the RSV3 bit.
    pub rsv3: bool,
}

impl RsvBits {
    /// No RSV bits used.
    pub const NONE: Self = Self {
        rsv1: false,
        rsv2: false,
        rsv3: false,
    };

    /// RSV1 only.
    pub const RSV1: Self = Self {
        rsv1: true,
        rsv2: false,
        rsv3: false,
    };
}

/// A WebSocket extension.
///
/// Implementations must be `Send + Sync`; frame transforms take `&mut self`
/// and must be called sequentially, in wire order, per direction.
pub trait Extension: Send + Sync {
    /// The extension name as it appears in `Sec-WebSocket-Extensions`.
    fn name(&self) -> &str;

    /// The RSV bits this extension claims.
    fn rsv_bits(&self) -> RsvBits {
        RsvBits::NONE
    }

    /// Negotiate against parameters offered by the peer (server side).
    ///
    /// Returns the parameters to send back in the response header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidExtension`] to reject the offer.
    fn negotiate(&mut self, params: &[ExtensionParam]) -> Result<Vec<ExtensionParam>>;

    /// Apply the peer's accepted parameters (client side).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidExtension`] when the response is
    /// incompatible with what was requested.
    fn configure(&mut self, params: &[ExtensionParam]) -> Result<()>;

    /// Transform a frame before it is sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Compression`] on engine failure.
    fn encode(&mut self, frame: &mut Frame) -> Result<()>;

    /// Transform a frame after it is received.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decompression`] when the payload cannot be
    /// restored; the connection should be torn down.
    fn decode(&mut self, frame: &mut Frame) -> Result<()>;

    /// Parameters to offer in a client handshake request.
    fn offer_params(&self) -> Vec<ExtensionParam> {
        Vec::new()
    }
}
