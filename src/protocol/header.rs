//! Staged frame-header parsing (RFC 6455 Section 5.2).
//!
//! A frame header spans 2 to 14 bytes and the receiver may see it split at
//! any byte boundary, so parsing is staged to match the receiver's states:
//! the fixed 2-byte prefix first, then the optional extended length, then
//! the optional mask key.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                 Masking key (if MASK set)                     |
//! +---------------------------------------------------------------+
//! ```

use crate::error::{Error, Result};
use crate::protocol::opcode::OpCode;

/// Maximum payload size for control frames (RFC 6455 Section 5.5).
pub const MAX_CONTROL_PAYLOAD: u64 = 125;

/// How the payload length is encoded after the fixed 2-byte prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthCode {
    /// Length 0-125, carried in the prefix itself.
    Inline(u8),
    /// `len7 == 126`: 2-byte big-endian length follows.
    U16,
    /// `len7 == 127`: 8-byte big-endian length follows, high bit clear.
    U64,
}

impl LengthCode {
    /// Number of extended-length bytes this code announces.
    #[must_use]
    pub const fn extended_len(self) -> usize {
        match self {
            LengthCode::Inline(_) => 0,
            LengthCode::U16 => 2,
            LengthCode::U64 => 8,
        }
    }
}

/// Parsed frame descriptor.
///
/// Built up across parsing stages: after [`parse_fixed`] the flags and
/// opcode are final; `payload_len` is final once any extended length is
/// decoded; `mask_key` is final once the key bytes arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment of its message.
    pub fin: bool,
    /// Reserved bit 1; claimed by permessage-deflate for "compressed".
    pub rsv1: bool,
    /// Reserved bit 2; no extension in this crate defines it.
    pub rsv2: bool,
    /// Reserved bit 3; no extension in this crate defines it.
    pub rsv3: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Whether a 4-byte mask key follows the length.
    pub masked: bool,
    /// Payload length in bytes.
    pub payload_len: u64,
    /// XOR mask key; all zeroes when `masked` is false.
    pub mask_key: [u8; 4],
}

/// Parse the fixed 2-byte header prefix.
///
/// Returns the descriptor (with `payload_len` filled in only for inline
/// lengths) and the length code telling the caller how many extended
/// length bytes to read next.
///
/// # Errors
///
/// Returns [`Error::ReservedOpcode`] for opcodes 0x3-0x7 and 0xB-0xF.
pub fn parse_fixed(bytes: [u8; 2]) -> Result<(FrameHeader, LengthCode)> {
    let [byte0, byte1] = bytes;

    let opcode = OpCode::from_u8(byte0 & 0x0F)?;
    let len7 = byte1 & 0x7F;

    let code = match len7 {
        0..=125 => LengthCode::Inline(len7),
        126 => LengthCode::U16,
        _ => LengthCode::U64,
    };

    let header = FrameHeader {
        fin: byte0 & 0x80 != 0,
        rsv1: byte0 & 0x40 != 0,
        rsv2: byte0 & 0x20 != 0,
        rsv3: byte0 & 0x10 != 0,
        opcode,
        masked: byte1 & 0x80 != 0,
        payload_len: match code {
            LengthCode::Inline(n) => u64::from(n),
            _ => 0,
        },
        mask_key: [0; 4],
    };

    Ok((header, code))
}

/// Decode the 2-byte extended length form.
#[must_use]
pub fn decode_len16(bytes: [u8; 2]) -> u64 {
    u64::from(u16::from_be_bytes(bytes))
}

/// Decode the 8-byte extended length form.
///
/// # Errors
///
/// Returns [`Error::Protocol`] when the most significant bit is set,
/// which RFC 6455 forbids.
pub fn decode_len64(bytes: [u8; 8]) -> Result<u64> {
    let len = u64::from_be_bytes(bytes);
    if len & (1 << 63) != 0 {
        return Err(Error::Protocol(
            "64-bit payload length with high bit set".into(),
        ));
    }
    Ok(len)
}

impl FrameHeader {
    /// Validate the header-level protocol rules.
    ///
    /// Called once the payload length is final. Fragmentation context
    /// (continuation ordering) is the receiver's to check, since only it
    /// knows whether a message is in flight.
    ///
    /// # Errors
    ///
    /// All violations map to close code 1002:
    /// - [`Error::ReservedBitsSet`] for rsv2/rsv3, or rsv1 without a
    ///   deflate context installed;
    /// - [`Error::Protocol`] for rsv1 on a control or continuation frame;
    /// - [`Error::FragmentedControlFrame`] for a control frame with FIN=0;
    /// - [`Error::ControlFrameTooLarge`] for a control payload over 125
    ///   bytes.
    pub fn validate(&self, deflate_installed: bool) -> Result<()> {
        if self.rsv2 || self.rsv3 {
            return Err(Error::ReservedBitsSet);
        }

        if self.rsv1 {
            if !deflate_installed {
                return Err(Error::ReservedBitsSet);
            }
            if self.opcode.is_control() {
                return Err(Error::Protocol("RSV1 set on control frame".into()));
            }
            if self.opcode == OpCode::Continuation {
                return Err(Error::Protocol("RSV1 set on continuation frame".into()));
            }
        }

        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload_len > MAX_CONTROL_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(self.payload_len));
            }
        }

        Ok(())
    }
}
