//! Permessage-deflate WebSocket compression extension (RFC 7692).
//!
//! Outgoing data frames are compressed with a shared sliding window and
//! marked with RSV1; incoming RSV1 frames are decompressed. Control frames
//! pass through untouched in both directions. The compression marker is set
//! on every transformed frame, continuation fragments included: the decoder
//! keys its per-message reset and flush handling off the fin flag, never
//! off RSV1, so the two ends stay consistent. Peers that expect the marker
//! on the first fragment only will still interoperate on receive, but
//! their own traffic must mark each fragment for this decoder to restore
//! fragmented messages.

use flate2::Compression;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::extensions::context::{Compressor, Decompressor};
use crate::extensions::{Extension, ExtensionParam, RsvBits};
use crate::protocol::Frame;

const MIN_WINDOW_BITS: u8 = 8;
const MAX_WINDOW_BITS: u8 = 15;
const DEFAULT_WINDOW_BITS: u8 = 15;

const EXTENSION_NAME: &str = "permessage-deflate";

fn validate_window_bits(name: &str, bits: u8) -> Result<()> {
    if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&bits) {
        return Err(Error::InvalidExtension(format!(
            "{} must be {}-{}, got {}",
            name, MIN_WINDOW_BITS, MAX_WINDOW_BITS, bits
        )));
    }
    Ok(())
}

/// Which end of the connection this extension instance lives on.
///
/// Determines how the negotiated `server_*`/`client_*` parameters map onto
/// the compress (local) and decompress (remote) directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The handshake initiator.
    Client,
    /// The handshake acceptor.
    Server,
}

/// Local preferences fed into negotiation.
///
/// Window bits are upper bounds: negotiation may settle on a smaller
/// window, never a larger one.
#[derive(Debug, Clone)]
pub struct DeflateConfig {
    /// Demand that the server reset its compression window per message.
    pub server_no_context_takeover: bool,
    /// Demand that the client reset its compression window per message.
    pub client_no_context_takeover: bool,
    /// Largest window accepted for server-compressed payloads.
    pub server_max_window_bits: u8,
    /// Largest window accepted for client-compressed payloads.
    pub client_max_window_bits: u8,
    /// Deflate compression level, 0-9.
    pub compression_level: u32,
}

impl Default for DeflateConfig {
    fn default() -> Self {
        Self {
            server_no_context_takeover: false,
            client_no_context_takeover: false,
            server_max_window_bits: DEFAULT_WINDOW_BITS,
            client_max_window_bits: DEFAULT_WINDOW_BITS,
            compression_level: 6,
        }
    }
}

impl DeflateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server_no_context_takeover(mut self, value: bool) -> Self {
        self.server_no_context_takeover = value;
        self
    }

    pub fn client_no_context_takeover(mut self, value: bool) -> Self {
        self.client_no_context_takeover = value;
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidExtension`] when `bits` is outside 8-15.
    pub fn server_max_window_bits(mut self, bits: u8) -> Result<Self> {
        validate_window_bits("server_max_window_bits", bits)?;
        self.server_max_window_bits = bits;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidExtension`] when `bits` is outside 8-15.
    pub fn client_max_window_bits(mut self, bits: u8) -> Result<Self> {
        validate_window_bits("client_max_window_bits", bits)?;
        self.client_max_window_bits = bits;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidExtension`] when `level` is above 9.
    pub fn compression_level(mut self, level: u32) -> Result<Self> {
        if level > 9 {
            return Err(Error::InvalidExtension(format!(
                "compression_level must be 0-9, got {}",
                level
            )));
        }
        self.compression_level = level;
        Ok(self)
    }
}

/// Final parameters for one connection, resolved from negotiation.
///
/// "Remote" is the direction this end decompresses, "local" the direction
/// it compresses. [`Role`] decides which of the wire-level `server_*` /
/// `client_*` parameters land on which side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeflateParams {
    /// The decompressor discards its window at every message start.
    pub remote_no_context_takeover: bool,
    /// The compressor discards its window at every message start.
    pub local_no_context_takeover: bool,
    /// Window size of remote-compressed payloads.
    pub remote_max_window_bits: u8,
    /// Window size used to compress local payloads.
    pub local_max_window_bits: u8,
}

impl Default for DeflateParams {
    fn default() -> Self {
        Self {
            remote_no_context_takeover: false,
            local_no_context_takeover: false,
            remote_max_window_bits: DEFAULT_WINDOW_BITS,
            local_max_window_bits: DEFAULT_WINDOW_BITS,
        }
    }
}

/// Stateful per-connection frame transform.
///
/// Owns one compressor and one decompressor. The two directions are
/// independent, but calls within each direction must be sequential and in
/// wire order, and an instance must never be shared across connections.
#[derive(Debug)]
pub struct PerMessageDeflate {
    params: DeflateParams,
    encoder: Compressor,
    decoder: Decompressor,
}

unsafe impl Send for PerMessageDeflate {}
unsafe impl Sync for PerMessageDeflate {}

impl PerMessageDeflate {
    /// Build a transform from resolved parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidExtension`] when a window-bits value is
    /// outside 8-15 or the level is above 9.
    pub fn new(params: DeflateParams, compression_level: u32) -> Result<Self> {
        validate_window_bits("remote_max_window_bits", params.remote_max_window_bits)?;
        validate_window_bits("local_max_window_bits", params.local_max_window_bits)?;
        if compression_level > 9 {
            return Err(Error::InvalidExtension(format!(
                "compression_level must be 0-9, got {}",
                compression_level
            )));
        }

        Ok(Self {
            params,
            encoder: Compressor::new(
                params.local_max_window_bits,
                params.local_no_context_takeover,
                Compression::new(compression_level),
            ),
            decoder: Decompressor::new(
                params.remote_max_window_bits,
                params.remote_no_context_takeover,
            ),
        })
    }

    /// The resolved parameters this transform runs with.
    #[must_use]
    pub fn params(&self) -> DeflateParams {
        self.params
    }

    /// Compress an outgoing frame in place.
    ///
    /// Control frames are returned unchanged. Every other frame is
    /// compressed and marked with RSV1, empty payloads included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Compression`] on engine failure.
    pub fn encode(&mut self, frame: &mut Frame) -> Result<()> {
        if frame.opcode.is_control() {
            return Ok(());
        }

        let before = frame.payload().len();
        let compressed = self.encoder.compress(frame.payload(), frame.fin)?;
        trace!(opcode = %frame.opcode, fin = frame.fin, before, after = compressed.len(), "compressed frame");
        frame.set_payload(compressed);
        frame.rsv1 = true;

        Ok(())
    }

    /// Decompress an incoming frame in place.
    ///
    /// Control frames and frames without the RSV1 marker are returned
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decompression`] when the payload cannot be
    /// restored; the connection should be treated as failed.
    pub fn decode(&mut self, frame: &mut Frame) -> Result<()> {
        if frame.opcode.is_control() || !frame.rsv1 {
            return Ok(());
        }

        let before = frame.payload().len();
        let payload = self.decoder.decompress(frame.payload(), frame.fin)?;
        trace!(opcode = %frame.opcode, fin = frame.fin, before, after = payload.len(), "decompressed frame");
        frame.set_payload(payload);
        frame.rsv1 = false;

        Ok(())
    }
}

/// A client's `client_max_window_bits` may arrive without a value: it then
/// announces support and lets the server pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BitsOffer {
    Unvalued,
    Value(u8),
}

/// Parameters seen in one offer or response, after duplicate and
/// range checks.
#[derive(Debug, Default)]
struct WireParams {
    server_no_context_takeover: bool,
    client_no_context_takeover: bool,
    server_max_window_bits: Option<u8>,
    client_max_window_bits: Option<BitsOffer>,
}

impl WireParams {
    fn extract(params: &[ExtensionParam]) -> Result<Self> {
        let mut out = Self::default();

        for param in params {
            match param.name.as_str() {
                "server_no_context_takeover" => {
                    if out.server_no_context_takeover {
                        return Err(Self::duplicate(&param.name));
                    }
                    Self::require_flag(param)?;
                    out.server_no_context_takeover = true;
                }
                "client_no_context_takeover" => {
                    if out.client_no_context_takeover {
                        return Err(Self::duplicate(&param.name));
                    }
                    Self::require_flag(param)?;
                    out.client_no_context_takeover = true;
                }
                "server_max_window_bits" => {
                    if out.server_max_window_bits.is_some() {
                        return Err(Self::duplicate(&param.name));
                    }
                    out.server_max_window_bits = Some(Self::parse_bits(param)?);
                }
                "client_max_window_bits" => {
                    if out.client_max_window_bits.is_some() {
                        return Err(Self::duplicate(&param.name));
                    }
                    out.client_max_window_bits = Some(if param.value.is_some() {
                        BitsOffer::Value(Self::parse_bits(param)?)
                    } else {
                        BitsOffer::Unvalued
                    });
                }
                _ => {
                    return Err(Error::InvalidExtension(format!(
                        "Unknown parameter: {}",
                        param.name
                    )));
                }
            }
        }

        Ok(out)
    }

    fn duplicate(name: &str) -> Error {
        Error::InvalidExtension(format!("Duplicate parameter: {}", name))
    }

    fn require_flag(param: &ExtensionParam) -> Result<()> {
        if param.value.is_some() {
            return Err(Error::InvalidExtension(format!(
                "{} takes no value",
                param.name
            )));
        }
        Ok(())
    }

    fn parse_bits(param: &ExtensionParam) -> Result<u8> {
        let value = param.value.as_deref().ok_or_else(|| {
            Error::InvalidExtension(format!("{} requires a value", param.name))
        })?;
        let bits: u8 = value.parse().map_err(|_| {
            Error::InvalidExtension(format!("Invalid window bits value: {}", value))
        })?;
        validate_window_bits(&param.name, bits)?;
        Ok(bits)
    }
}

/// Role-aware permessage-deflate extension.
///
/// Holds the local [`DeflateConfig`] until the handshake resolves it into
/// [`DeflateParams`]; frame traffic passes through unchanged until then.
pub struct DeflateExtension {
    role: Role,
    config: DeflateConfig,
    transform: Option<PerMessageDeflate>,
}

impl DeflateExtension {
    /// Create a client-side (handshake initiator) extension.
    pub fn client(config: DeflateConfig) -> Self {
        Self {
            role: Role::Client,
            config,
            transform: None,
        }
    }

    /// Create a server-side (handshake acceptor) extension.
    pub fn server(config: DeflateConfig) -> Self {
        Self {
            role: Role::Server,
            config,
            transform: None,
        }
    }

    /// Whether negotiation has completed and frames are being transformed.
    #[must_use]
    pub fn is_negotiated(&self) -> bool {
        self.transform.is_some()
    }

    /// The parameters negotiation settled on, if it has completed.
    #[must_use]
    pub fn negotiated_params(&self) -> Option<DeflateParams> {
        self.transform.as_ref().map(PerMessageDeflate::params)
    }

    fn activate(
        &mut self,
        server_no_context_takeover: bool,
        client_no_context_takeover: bool,
        server_max_window_bits: u8,
        client_max_window_bits: u8,
    ) -> Result<()> {
        let params = match self.role {
            Role::Server => DeflateParams {
                remote_no_context_takeover: client_no_context_takeover,
                local_no_context_takeover: server_no_context_takeover,
                remote_max_window_bits: client_max_window_bits,
                local_max_window_bits: server_max_window_bits,
            },
            Role::Client => DeflateParams {
                remote_no_context_takeover: server_no_context_takeover,
                local_no_context_takeover: client_no_context_takeover,
                remote_max_window_bits: server_max_window_bits,
                local_max_window_bits: client_max_window_bits,
            },
        };

        debug!(
            role = ?self.role,
            ?params,
            level = self.config.compression_level,
            "permessage-deflate negotiated"
        );
        self.transform = Some(PerMessageDeflate::new(params, self.config.compression_level)?);
        Ok(())
    }
}

impl Extension for DeflateExtension {
    fn name(&self) -> &str {
        EXTENSION_NAME
    }

    fn rsv_bits(&self) -> RsvBits {
        RsvBits::RSV1
    }

    /// Resolve a client's offer against the local configuration.
    ///
    /// No-context-takeover flags are accepted as offered and demanded in
    /// the response whenever the local configuration requires them.
    /// Window-bits offers are clamped to the configured maximum; a bare
    /// `client_max_window_bits` resolves to the configured value. A
    /// configured client window below 15 requires the client to have
    /// offered `client_max_window_bits` at all, otherwise the offer is
    /// rejected.
    fn negotiate(&mut self, params: &[ExtensionParam]) -> Result<Vec<ExtensionParam>> {
        let offer = WireParams::extract(params)?;

        let server_no_context_takeover =
            self.config.server_no_context_takeover || offer.server_no_context_takeover;
        let client_no_context_takeover =
            self.config.client_no_context_takeover || offer.client_no_context_takeover;

        let server_max_window_bits = offer
            .server_max_window_bits
            .unwrap_or(DEFAULT_WINDOW_BITS)
            .min(self.config.server_max_window_bits);

        let client_max_window_bits = match offer.client_max_window_bits {
            Some(BitsOffer::Value(bits)) => bits.min(self.config.client_max_window_bits),
            Some(BitsOffer::Unvalued) => self.config.client_max_window_bits,
            None => {
                if self.config.client_max_window_bits < DEFAULT_WINDOW_BITS {
                    return Err(Error::InvalidExtension(
                        "client did not offer client_max_window_bits".into(),
                    ));
                }
                DEFAULT_WINDOW_BITS
            }
        };

        let mut response = Vec::new();
        if server_no_context_takeover {
            response.push(ExtensionParam::flag("server_no_context_takeover"));
        }
        if client_no_context_takeover {
            response.push(ExtensionParam::flag("client_no_context_takeover"));
        }
        if server_max_window_bits != DEFAULT_WINDOW_BITS {
            response.push(ExtensionParam::new(
                "server_max_window_bits",
                server_max_window_bits.to_string(),
            ));
        }
        if client_max_window_bits != DEFAULT_WINDOW_BITS {
            response.push(ExtensionParam::new(
                "client_max_window_bits",
                client_max_window_bits.to_string(),
            ));
        }

        self.activate(
            server_no_context_takeover,
            client_no_context_takeover,
            server_max_window_bits,
            client_max_window_bits,
        )?;

        Ok(response)
    }

    /// Apply a server's response to the offer this configuration produced.
    ///
    /// A response missing a demanded `server_no_context_takeover`, or
    /// granting more window bits than were requested, is a negotiation
    /// failure. A locally demanded `client_no_context_takeover` holds even
    /// when the server omits it.
    fn configure(&mut self, params: &[ExtensionParam]) -> Result<()> {
        let response = WireParams::extract(params)?;

        if self.config.server_no_context_takeover && !response.server_no_context_takeover {
            return Err(Error::InvalidExtension(
                "expected server_no_context_takeover in response".into(),
            ));
        }
        let server_no_context_takeover = response.server_no_context_takeover;
        let client_no_context_takeover =
            response.client_no_context_takeover || self.config.client_no_context_takeover;

        let server_max_window_bits = match response.server_max_window_bits {
            Some(bits) => {
                if bits > self.config.server_max_window_bits {
                    return Err(Error::InvalidExtension(format!(
                        "unsupported server_max_window_bits: {}",
                        bits
                    )));
                }
                bits
            }
            None => {
                if self.config.server_max_window_bits < DEFAULT_WINDOW_BITS {
                    return Err(Error::InvalidExtension(
                        "expected server_max_window_bits in response".into(),
                    ));
                }
                DEFAULT_WINDOW_BITS
            }
        };

        let client_max_window_bits = match response.client_max_window_bits {
            Some(BitsOffer::Value(bits)) => {
                if bits > self.config.client_max_window_bits {
                    return Err(Error::InvalidExtension(format!(
                        "unsupported client_max_window_bits: {}",
                        bits
                    )));
                }
                bits
            }
            Some(BitsOffer::Unvalued) => {
                return Err(Error::InvalidExtension(
                    "client_max_window_bits requires a value in a response".into(),
                ));
            }
            None => self.config.client_max_window_bits,
        };

        self.activate(
            server_no_context_takeover,
            client_no_context_takeover,
            server_max_window_bits,
            client_max_window_bits,
        )
    }

    fn encode(&mut self, frame: &mut Frame) -> Result<()> {
        match &mut self.transform {
            Some(transform) => transform.encode(frame),
            None => Ok(()),
        }
    }

    fn decode(&mut self, frame: &mut Frame) -> Result<()> {
        match &mut self.transform {
            Some(transform) => transform.decode(frame),
            None => Ok(()),
        }
    }

    fn offer_params(&self) -> Vec<ExtensionParam> {
        let mut params = Vec::new();

        if self.config.server_no_context_takeover {
            params.push(ExtensionParam::flag("server_no_context_takeover"));
        }
        if self.config.client_no_context_takeover {
            params.push(ExtensionParam::flag("client_no_context_takeover"));
        }
        if self.config.server_max_window_bits != DEFAULT_WINDOW_BITS {
            params.push(ExtensionParam::new(
                "server_max_window_bits",
                self.config.server_max_window_bits.to_string(),
            ));
        }
        if self.config.client_max_window_bits != DEFAULT_WINDOW_BITS {
            params.push(ExtensionParam::new(
                "client_max_window_bits",
                self.config.client_max_window_bits.to_string(),
            ));
        }

        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OpCode;

    fn transform() -> PerMessageDeflate {
        PerMessageDeflate::new(DeflateParams::default(), 6).unwrap()
    }

    #[test]
    fn test_compression_roundtrip() {
        let mut pmd = transform();

        let original = b"Hello, WebSocket compression! This is a test message.".to_vec();
        let mut frame = Frame::text(original.clone());

        pmd.encode(&mut frame).unwrap();
        assert!(frame.rsv1);
        assert_ne!(frame.payload(), &original[..]);

        pmd.decode(&mut frame).unwrap();
        assert!(!frame.rsv1);
        assert_eq!(frame.payload(), &original[..]);
    }

    #[test]
    fn test_fragmented_roundtrip_marks_every_fragment() {
        let mut pmd = transform();

        let mut frames = vec![
            Frame::new(false, OpCode::Text, &b"I love websockets, "[..]),
            Frame::new(false, OpCode::Continuation, &b"especially "[..]),
            Frame::new(true, OpCode::Continuation, &b"RFC 7692"[..]),
        ];

        for frame in &mut frames {
            pmd.encode(frame).unwrap();
            assert!(frame.rsv1);
        }
        for frame in &mut frames {
            pmd.decode(frame).unwrap();
            assert!(!frame.rsv1);
        }

        let message: Vec<u8> = frames.iter().flat_map(|f| f.payload().to_vec()).collect();
        assert_eq!(message, b"I love websockets, especially RFC 7692");
    }

    #[test]
    fn test_control_frame_bypass() {
        let mut pmd = transform();

        for mut frame in [
            Frame::ping(&b"ping"[..]),
            Frame::pong(&b"pong"[..]),
            Frame::ping(&b""[..]),
            Frame::close(Some(1000), ""),
            Frame::close(Some(1001), "going away"),
        ] {
            let original = frame.clone();
            pmd.encode(&mut frame).unwrap();
            assert_eq!(frame, original);
            pmd.decode(&mut frame).unwrap();
            assert_eq!(frame, original);
        }
    }

    #[test]
    fn test_unmarked_frame_passthrough() {
        let mut pmd = transform();

        for mut frame in [
            Frame::text(&b"plain text"[..]),
            Frame::new(false, OpCode::Binary, &b"plain binary"[..]),
            Frame::new(true, OpCode::Continuation, &b"tail fragment"[..]),
        ] {
            let original = frame.clone();
            pmd.decode(&mut frame).unwrap();
            assert_eq!(frame, original);
        }
    }

    #[test]
    fn test_control_frame_with_rsv1_passthrough() {
        let mut pmd = transform();

        let mut frame = Frame::ping(&b"not actually compressed"[..]);
        frame.rsv1 = true;
        let original = frame.clone();
        pmd.decode(&mut frame).unwrap();
        assert_eq!(frame, original);
    }

    #[test]
    fn test_empty_payload_is_compressed() {
        let mut pmd = transform();

        let mut frame = Frame::text(&b""[..]);
        pmd.encode(&mut frame).unwrap();
        assert!(frame.rsv1);
        assert_eq!(frame.payload(), [0x00]);

        pmd.decode(&mut frame).unwrap();
        assert!(!frame.rsv1);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn test_shared_context_across_messages() {
        let mut pmd = transform();

        let mut first = Frame::text("café");
        let mut second = Frame::text("café");
        pmd.encode(&mut first).unwrap();
        pmd.encode(&mut second).unwrap();

        assert_eq!(first.payload(), [0x4a, 0x4e, 0x4c, 0x3b, 0xbc, 0x12, 0x00]);
        assert_eq!(second.payload(), [0x4a, 0x06, 0x11, 0x00, 0x00]);

        pmd.decode(&mut first).unwrap();
        pmd.decode(&mut second).unwrap();
        assert_eq!(first.payload(), "café".as_bytes());
        assert_eq!(second.payload(), "café".as_bytes());
    }

    #[test]
    fn test_local_no_context_takeover_repeats_output() {
        let params = DeflateParams {
            local_no_context_takeover: true,
            ..DeflateParams::default()
        };
        let mut pmd = PerMessageDeflate::new(params, 6).unwrap();

        let mut first = Frame::text("café");
        let mut second = Frame::text("café");
        pmd.encode(&mut first).unwrap();
        pmd.encode(&mut second).unwrap();
        assert_eq!(first.payload(), second.payload());
    }

    #[test]
    fn test_reset_policy_mismatch_fails_decoding_second_message() {
        let mut sender = transform();
        let params = DeflateParams {
            remote_no_context_takeover: true,
            ..DeflateParams::default()
        };
        let mut receiver = PerMessageDeflate::new(params, 6).unwrap();

        let mut first = Frame::text("café");
        let mut second = Frame::text("café");
        sender.encode(&mut first).unwrap();
        sender.encode(&mut second).unwrap();

        receiver.decode(&mut first).unwrap();
        let err = receiver.decode(&mut second).unwrap_err();
        assert!(matches!(err, Error::Decompression(_)));
    }

    #[test]
    fn test_params_validation() {
        let bad_bits = DeflateParams {
            remote_max_window_bits: 16,
            ..DeflateParams::default()
        };
        assert!(PerMessageDeflate::new(bad_bits, 6).is_err());

        let bad_bits = DeflateParams {
            local_max_window_bits: 7,
            ..DeflateParams::default()
        };
        assert!(PerMessageDeflate::new(bad_bits, 6).is_err());

        assert!(PerMessageDeflate::new(DeflateParams::default(), 10).is_err());
        assert!(PerMessageDeflate::new(DeflateParams::default(), 0).is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(DeflateConfig::new().server_max_window_bits(8).is_ok());
        assert!(DeflateConfig::new().server_max_window_bits(15).is_ok());
        assert!(DeflateConfig::new().server_max_window_bits(7).is_err());
        assert!(DeflateConfig::new().server_max_window_bits(16).is_err());

        assert!(DeflateConfig::new().client_max_window_bits(8).is_ok());
        assert!(DeflateConfig::new().client_max_window_bits(16).is_err());

        assert!(DeflateConfig::new().compression_level(0).is_ok());
        assert!(DeflateConfig::new().compression_level(9).is_ok());
        assert!(DeflateConfig::new().compression_level(10).is_err());
    }

    #[test]
    fn test_server_negotiation_resolves_offer() {
        let mut ext = DeflateExtension::server(DeflateConfig::default());

        let offer = vec![
            ExtensionParam::flag("server_no_context_takeover"),
            ExtensionParam::new("client_max_window_bits", "12"),
        ];
        let response = ext.negotiate(&offer).unwrap();

        assert!(response.iter().any(|p| p.name == "server_no_context_takeover"));
        assert!(response
            .iter()
            .any(|p| p.name == "client_max_window_bits" && p.value.as_deref() == Some("12")));

        let params = ext.negotiated_params().unwrap();
        assert!(params.local_no_context_takeover);
        assert!(!params.remote_no_context_takeover);
        assert_eq!(params.remote_max_window_bits, 12);
        assert_eq!(params.local_max_window_bits, 15);
    }

    #[test]
    fn test_server_clamps_window_bits_to_config() {
        let config = DeflateConfig::new().server_max_window_bits(10).unwrap();
        let mut ext = DeflateExtension::server(config);

        let offer = vec![ExtensionParam::new("server_max_window_bits", "12")];
        let response = ext.negotiate(&offer).unwrap();
        assert!(response
            .iter()
            .any(|p| p.name == "server_max_window_bits" && p.value.as_deref() == Some("10")));
        assert_eq!(ext.negotiated_params().unwrap().local_max_window_bits, 10);

        // A lower offer is taken as-is.
        let config = DeflateConfig::new().server_max_window_bits(10).unwrap();
        let mut ext = DeflateExtension::server(config);
        let offer = vec![ExtensionParam::new("server_max_window_bits", "9")];
        let response = ext.negotiate(&offer).unwrap();
        assert!(response
            .iter()
            .any(|p| p.name == "server_max_window_bits" && p.value.as_deref() == Some("9")));
    }

    #[test]
    fn test_server_resolves_bare_client_max_window_bits() {
        let config = DeflateConfig::new().client_max_window_bits(11).unwrap();
        let mut ext = DeflateExtension::server(config);

        let offer = vec![ExtensionParam::flag("client_max_window_bits")];
        let response = ext.negotiate(&offer).unwrap();
        assert!(response
            .iter()
            .any(|p| p.name == "client_max_window_bits" && p.value.as_deref() == Some("11")));
        assert_eq!(ext.negotiated_params().unwrap().remote_max_window_bits, 11);
    }

    #[test]
    fn test_server_requires_client_window_offer_when_configured_below_default() {
        let config = DeflateConfig::new().client_max_window_bits(11).unwrap();
        let mut ext = DeflateExtension::server(config);

        assert!(ext.negotiate(&[]).is_err());
        assert!(!ext.is_negotiated());
    }

    #[test]
    fn test_server_demands_configured_flags() {
        let config = DeflateConfig::new()
            .server_no_context_takeover(true)
            .client_no_context_takeover(true);
        let mut ext = DeflateExtension::server(config);

        let response = ext.negotiate(&[]).unwrap();
        assert!(response.iter().any(|p| p.name == "server_no_context_takeover"));
        assert!(response.iter().any(|p| p.name == "client_no_context_takeover"));

        let params = ext.negotiated_params().unwrap();
        assert!(params.local_no_context_takeover);
        assert!(params.remote_no_context_takeover);
    }

    #[test]
    fn test_malformed_offers_rejected() {
        let cases: Vec<Vec<ExtensionParam>> = vec![
            vec![ExtensionParam::flag("unknown_param")],
            vec![
                ExtensionParam::flag("server_no_context_takeover"),
                ExtensionParam::flag("server_no_context_takeover"),
            ],
            vec![
                ExtensionParam::new("client_max_window_bits", "12"),
                ExtensionParam::flag("client_max_window_bits"),
            ],
            vec![ExtensionParam::new("server_no_context_takeover", "yes")],
            vec![ExtensionParam::flag("server_max_window_bits")],
            vec![ExtensionParam::new("server_max_window_bits", "16")],
            vec![ExtensionParam::new("server_max_window_bits", "abc")],
        ];

        for params in cases {
            let mut ext = DeflateExtension::server(DeflateConfig::default());
            assert!(ext.negotiate(&params).is_err(), "accepted {:?}", params);
        }
    }

    #[test]
    fn test_client_configure_maps_roles() {
        let mut ext = DeflateExtension::client(DeflateConfig::default());

        let response = vec![
            ExtensionParam::flag("server_no_context_takeover"),
            ExtensionParam::new("server_max_window_bits", "12"),
        ];
        ext.configure(&response).unwrap();

        let params = ext.negotiated_params().unwrap();
        // The server compresses what we decompress.
        assert!(params.remote_no_context_takeover);
        assert!(!params.local_no_context_takeover);
        assert_eq!(params.remote_max_window_bits, 12);
        assert_eq!(params.local_max_window_bits, 15);
    }

    #[test]
    fn test_client_rejects_escalated_window_bits() {
        let config = DeflateConfig::new().server_max_window_bits(10).unwrap();
        let mut ext = DeflateExtension::client(config);
        let response = vec![ExtensionParam::new("server_max_window_bits", "12")];
        assert!(ext.configure(&response).is_err());

        let config = DeflateConfig::new().client_max_window_bits(10).unwrap();
        let mut ext = DeflateExtension::client(config);
        let response = vec![ExtensionParam::new("client_max_window_bits", "12")];
        assert!(ext.configure(&response).is_err());
    }

    #[test]
    fn test_client_expects_demanded_server_flag() {
        let config = DeflateConfig::new().server_no_context_takeover(true);
        let mut ext = DeflateExtension::client(config);
        assert!(ext.configure(&[]).is_err());
    }

    #[test]
    fn test_client_keeps_own_reset_demand() {
        let config = DeflateConfig::new().client_no_context_takeover(true);
        let mut ext = DeflateExtension::client(config);
        ext.configure(&[]).unwrap();
        assert!(ext.negotiated_params().unwrap().local_no_context_takeover);
    }

    #[test]
    fn test_client_rejects_bare_client_window_bits_in_response() {
        let mut ext = DeflateExtension::client(DeflateConfig::default());
        let response = vec![ExtensionParam::flag("client_max_window_bits")];
        assert!(ext.configure(&response).is_err());
    }

    #[test]
    fn test_offer_params() {
        let config = DeflateConfig::new()
            .server_no_context_takeover(true)
            .client_max_window_bits(12)
            .unwrap();
        let ext = DeflateExtension::client(config);

        let params = ext.offer_params();
        assert!(params.iter().any(|p| p.name == "server_no_context_takeover"));
        assert!(params
            .iter()
            .any(|p| p.name == "client_max_window_bits" && p.value.as_deref() == Some("12")));
        // Defaults are not offered.
        assert!(!params.iter().any(|p| p.name == "server_max_window_bits"));
    }

    #[test]
    fn test_not_negotiated_passthrough() {
        let mut ext = DeflateExtension::server(DeflateConfig::default());

        let mut frame = Frame::text(&b"untouched"[..]);
        let original = frame.clone();
        ext.encode(&mut frame).unwrap();
        assert_eq!(frame, original);
        ext.decode(&mut frame).unwrap();
        assert_eq!(frame, original);
    }

    #[test]
    fn test_extension_name_and_rsv_bits() {
        let ext = DeflateExtension::server(DeflateConfig::default());
        assert_eq!(ext.name(), "permessage-deflate");
        assert_eq!(ext.rsv_bits(), RsvBits::RSV1);
    }
}
