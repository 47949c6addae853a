//! Inbound permessage-deflate support (RFC 7692).
//!
//! The receiver hands each compressed data frame's payload to
//! [`PermessageDeflate::decompress`] as it arrives; the inflater state is
//! shared across the fragments of a message. The final chunk of a message
//! (`fin = true`) gets the `0x00 0x00 0xFF 0xFF` tail the sender stripped,
//! completing the DEFLATE block sequence.

use flate2::{Decompress, FlushDecompress, Status};

use crate::config::Role;
use crate::error::{Error, Result};
use crate::extensions::ExtensionParam;

const MIN_WINDOW_BITS: u8 = 8;
const MAX_WINDOW_BITS: u8 = 15;
const DEFAULT_WINDOW_BITS: u8 = 15;
const DEFLATE_TRAILER: [u8; 4] = [0x00, 0x00, 0xff, 0xff];
const INFLATE_BUF_SIZE: usize = 4096;
const MAX_INFLATE_ITERATIONS: usize = 100_000;
const MAX_INFLATE_RATIO: usize = 100;

/// Negotiated parameters governing the inbound compressed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeflateConfig {
    /// Peer resets its compression dictionary after every message; our
    /// inflater mirrors that by dropping its own state on message end.
    pub no_context_takeover: bool,
    /// LZ77 sliding window size of the inbound stream (8-15).
    pub max_window_bits: u8,
}

impl Default for DeflateConfig {
    fn default() -> Self {
        Self {
            no_context_takeover: false,
            max_window_bits: DEFAULT_WINDOW_BITS,
        }
    }
}

impl DeflateConfig {
    /// Create a configuration with RFC 7692 defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `no_context_takeover` (builder pattern).
    #[must_use]
    pub fn no_context_takeover(mut self, value: bool) -> Self {
        self.no_context_takeover = value;
        self
    }

    /// Set the inbound window size (8-15).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Extension`] when `bits` is out of range.
    pub fn max_window_bits(mut self, bits: u8) -> Result<Self> {
        if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&bits) {
            return Err(Error::Extension(format!(
                "max_window_bits must be {MIN_WINDOW_BITS}-{MAX_WINDOW_BITS}, got {bits}"
            )));
        }
        self.max_window_bits = bits;
        Ok(self)
    }

    /// Build a configuration from negotiated `permessage-deflate`
    /// parameters.
    ///
    /// Only the parameters governing the inbound direction apply: a
    /// server inflates what the client compressed, so `client_*`
    /// parameters bind for [`Role::Server`] and `server_*` parameters for
    /// [`Role::Client`]. The rest configure the (out-of-scope) outbound
    /// direction and are accepted without effect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Extension`] for unknown parameters or out-of-range
    /// window bits.
    pub fn accept(params: &[ExtensionParam], role: Role) -> Result<Self> {
        let mut config = Self::default();

        for param in params {
            match param.name.as_str() {
                "server_no_context_takeover" => {
                    if role == Role::Client {
                        config.no_context_takeover = true;
                    }
                }
                "client_no_context_takeover" => {
                    if role == Role::Server {
                        config.no_context_takeover = true;
                    }
                }
                "server_max_window_bits" => {
                    if role == Role::Client {
                        config.max_window_bits = parse_window_bits(param.value.as_deref())?;
                    }
                }
                "client_max_window_bits" => {
                    if role == Role::Server {
                        config.max_window_bits = parse_window_bits(param.value.as_deref())?;
                    }
                }
                other => {
                    return Err(Error::Extension(format!("unknown parameter: {other}")));
                }
            }
        }

        Ok(config)
    }
}

fn parse_window_bits(value: Option<&str>) -> Result<u8> {
    match value {
        Some(s) => {
            let bits: u8 = s
                .parse()
                .map_err(|_| Error::Extension(format!("invalid window bits value: {s}")))?;
            if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&bits) {
                return Err(Error::Extension(format!(
                    "window bits must be {MIN_WINDOW_BITS}-{MAX_WINDOW_BITS}, got {bits}"
                )));
            }
            Ok(bits)
        }
        // A bare client_max_window_bits offer means "pick for me".
        None => Ok(DEFAULT_WINDOW_BITS),
    }
}

/// Streaming inbound decompressor for one connection.
///
/// Holds the raw-deflate inflater whose dictionary spans messages when
/// context takeover is in effect, plus the per-message output accounting
/// that backs the receiver's payload cap.
pub struct PermessageDeflate {
    config: DeflateConfig,
    inflater: Option<Decompress>,
    max_payload: u64,
    message_len: u64,
}

impl PermessageDeflate {
    /// Create a decompressor from negotiated parameters.
    #[must_use]
    pub fn new(config: DeflateConfig) -> Self {
        Self {
            config,
            inflater: None,
            max_payload: 0,
            message_len: 0,
        }
    }

    /// Mirror the receiver's cumulative payload cap (0 = unbounded).
    ///
    /// When set, decompression aborts with close code 1009 as soon as the
    /// cumulative output of the in-flight message passes the cap, even
    /// mid-chunk.
    pub fn set_max_payload(&mut self, max_payload: u64) {
        self.max_payload = max_payload;
    }

    /// Decompress one frame's payload.
    ///
    /// `fin` marks the last chunk of the message: the DEFLATE tail is
    /// appended internally, per-message accounting resets, and without
    /// context takeover the dictionary is dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::MessageTooLarge`] when cumulative output passes the cap;
    /// - [`Error::Extension`] for corrupt streams, runaway expansion
    ///   ratios, or a stalled inflater.
    pub fn decompress(&mut self, chunk: &[u8], fin: bool) -> Result<Vec<u8>> {
        let mut input = Vec::with_capacity(chunk.len() + DEFLATE_TRAILER.len());
        input.extend_from_slice(chunk);
        if fin {
            input.extend_from_slice(&DEFLATE_TRAILER);
        }
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let window_bits = self.config.max_window_bits;
        let inflater = self
            .inflater
            .get_or_insert_with(|| Decompress::new_with_window_bits(false, window_bits));

        let ratio_ceiling = input.len().saturating_mul(MAX_INFLATE_RATIO);
        let mut output = Vec::with_capacity(input.len().min(INFLATE_BUF_SIZE));
        let mut input_pos = 0;
        let mut iterations = 0;

        loop {
            iterations += 1;
            if iterations > MAX_INFLATE_ITERATIONS {
                return Err(Error::Extension(
                    "decompression exceeded iteration limit".into(),
                ));
            }

            let old_len = output.len();
            output.resize(old_len + INFLATE_BUF_SIZE, 0);

            let before_in = inflater.total_in();
            let before_out = inflater.total_out();

            let status = inflater
                .decompress(
                    &input[input_pos..],
                    &mut output[old_len..],
                    FlushDecompress::Sync,
                )
                .map_err(|e| Error::Extension(format!("decompression failed: {e}")))?;

            let consumed = (inflater.total_in() - before_in) as usize;
            let produced = (inflater.total_out() - before_out) as usize;
            output.truncate(old_len + produced);
            input_pos += consumed;

            let cumulative = self.message_len + output.len() as u64;
            if self.max_payload > 0 && cumulative > self.max_payload {
                return Err(Error::MessageTooLarge {
                    size: cumulative,
                    max: self.max_payload,
                });
            }
            if output.len() > ratio_ceiling {
                return Err(Error::Extension(format!(
                    "decompression ratio exceeded {MAX_INFLATE_RATIO}x"
                )));
            }

            if status == Status::StreamEnd {
                break;
            }
            // Done once the input is drained and the last round did not
            // fill the output buffer (a full buffer may hide pending
            // output from an already-consumed match).
            if input_pos == input.len() && produced < INFLATE_BUF_SIZE {
                break;
            }
            if consumed == 0 && produced == 0 {
                break;
            }
        }

        if fin {
            self.message_len = 0;
            if self.config.no_context_takeover {
                self.inflater = None;
            }
        } else {
            self.message_len += output.len() as u64;
        }

        Ok(output)
    }

    /// Release inflater state. Idempotent.
    pub fn cleanup(&mut self) {
        self.inflater = None;
        self.message_len = 0;
    }
}
