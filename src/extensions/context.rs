//! Per-direction sliding-window compression contexts.
//!
//! Each direction of a connection owns exactly one context: a raw-deflate
//! engine whose window survives across messages ("context takeover") unless
//! the negotiated policy calls for a fresh engine at the start of every
//! message. Calls must be sequential and in wire order for the direction;
//! the engine's output depends on everything it has seen before.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::error::{Error, Result};

/// Trailing bytes a deflate sync flush emits: an empty stored block.
///
/// The compressor strips these four bytes from the final fragment of every
/// message; the decompressor appends them again before inflating. Non-final
/// fragments keep the trailer on the wire.
pub const DEFLATE_TRAILER: [u8; 4] = [0x00, 0x00, 0xff, 0xff];

/// Granularity of output buffer growth while (de)compressing.
const OUTPUT_CHUNK: usize = 4096;

/// zlib cannot set up a raw deflate stream with an 8-bit window, so a
/// negotiated value of 8 runs on a 9-bit engine. Decoding is unaffected:
/// a wider window accepts every stream a narrower one produces.
#[inline]
fn engine_window_bits(bits: u8) -> u8 {
    bits.max(9)
}

/// Outbound codec: compresses one fragment at a time.
#[derive(Debug)]
pub struct Compressor {
    engine: Compress,
    level: Compression,
    window_bits: u8,
    reset_per_message: bool,
    mid_message: bool,
}

impl Compressor {
    /// Create a compressor with the given window size and reset policy.
    ///
    /// `window_bits` must already be validated to the negotiable range.
    pub fn new(window_bits: u8, reset_per_message: bool, level: Compression) -> Self {
        Self {
            engine: Compress::new_with_window_bits(level, false, engine_window_bits(window_bits)),
            level,
            window_bits,
            reset_per_message,
            mid_message: false,
        }
    }

    /// Compress one fragment; `fin` marks the final fragment of a message.
    ///
    /// The output is sync-flushed, so every fragment is a byte-aligned,
    /// self-contained block and the engine stays ready to emit backward
    /// references against prior input. The final fragment has the
    /// [`DEFLATE_TRAILER`] stripped.
    pub fn compress(&mut self, payload: &[u8], fin: bool) -> Result<Vec<u8>> {
        if !self.mid_message && self.reset_per_message {
            self.engine =
                Compress::new_with_window_bits(self.level, false, engine_window_bits(self.window_bits));
        }
        self.mid_message = !fin;

        let mut output = Vec::with_capacity(payload.len() / 2 + DEFLATE_TRAILER.len() + 1);

        let mut consumed = 0;
        while consumed < payload.len() {
            if output.len() == output.capacity() {
                output.reserve(OUTPUT_CHUNK);
            }
            let before = self.engine.total_in();
            self.engine
                .compress_vec(&payload[consumed..], &mut output, FlushCompress::None)
                .map_err(|e| Error::Compression(e.to_string()))?;
            consumed += (self.engine.total_in() - before) as usize;
        }

        loop {
            if output.len() == output.capacity() {
                output.reserve(OUTPUT_CHUNK);
            }
            let before = output.len();
            self.engine
                .compress_vec(&[], &mut output, FlushCompress::Sync)
                .map_err(|e| Error::Compression(e.to_string()))?;
            if output.len() == before {
                break;
            }
        }

        if fin && output.ends_with(&DEFLATE_TRAILER) {
            output.truncate(output.len() - DEFLATE_TRAILER.len());
        }

        Ok(output)
    }
}

/// Inbound codec: decompresses one fragment at a time.
#[derive(Debug)]
pub struct Decompressor {
    engine: Decompress,
    window_bits: u8,
    reset_per_message: bool,
    mid_message: bool,
}

impl Decompressor {
    /// Create a decompressor with the given window size and reset policy.
    pub fn new(window_bits: u8, reset_per_message: bool) -> Self {
        Self {
            engine: Decompress::new_with_window_bits(false, engine_window_bits(window_bits)),
            window_bits,
            reset_per_message,
            mid_message: false,
        }
    }

    /// Decompress one fragment; `fin` marks the final fragment of a message.
    ///
    /// For final fragments the [`DEFLATE_TRAILER`] the peer stripped is
    /// appended before inflating. Fails with [`Error::Decompression`] on
    /// malformed input or on backward references beyond the retained
    /// window, after which the context must not be reused.
    pub fn decompress(&mut self, payload: &[u8], fin: bool) -> Result<Vec<u8>> {
        if !self.mid_message && self.reset_per_message {
            self.engine = Decompress::new_with_window_bits(false, engine_window_bits(self.window_bits));
        }
        self.mid_message = !fin;

        let mut output = Vec::with_capacity(payload.len().saturating_mul(2) + 1);
        self.inflate(payload, &mut output)?;
        if fin {
            self.inflate(&DEFLATE_TRAILER, &mut output)?;
        }
        Ok(output)
    }

    fn inflate(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        let mut consumed = 0;
        while consumed < input.len() {
            if output.len() == output.capacity() {
                output.reserve(OUTPUT_CHUNK);
            }
            let before_in = self.engine.total_in();
            let before_out = self.engine.total_out();
            let status = self
                .engine
                .decompress_vec(&input[consumed..], output, FlushDecompress::None)
                .map_err(|e| Error::Decompression(e.to_string()))?;
            consumed += (self.engine.total_in() - before_in) as usize;

            match status {
                Status::Ok => {}
                Status::StreamEnd => break,
                Status::BufError => {
                    // Stalling with both input and output space left means
                    // the stream is malformed.
                    if self.engine.total_in() == before_in
                        && self.engine.total_out() == before_out
                    {
                        return Err(Error::Decompression(
                            "compressed stream stalled before end of input".into(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
