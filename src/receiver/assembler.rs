//! Reassembly of fragmented messages.
//!
//! The assembler tracks the *message* in flight while the receiver's state
//! enum tracks the *frame* in flight; control frames pass the assembler by
//! entirely. Fragments are stored decoded (unmasked and, for compressed
//! messages, inflated) and concatenated once the final fragment lands.

use bytes::Bytes;

use crate::protocol::OpCode;

/// Accumulates the decoded fragments of one in-flight message.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    opcode: Option<OpCode>,
    compressed: bool,
    fragments: Vec<Bytes>,
    len: usize,
}

impl MessageAssembler {
    /// Create an idle assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a message. `opcode` is the first frame's (Text or Binary);
    /// `compressed` is its RSV1 bit.
    pub fn start(&mut self, opcode: OpCode, compressed: bool) {
        self.opcode = Some(opcode);
        self.compressed = compressed;
        self.fragments.clear();
        self.len = 0;
    }

    /// Append one decoded fragment.
    pub fn append(&mut self, payload: impl Into<Bytes>) {
        let payload = payload.into();
        self.len += payload.len();
        self.fragments.push(payload);
    }

    /// Opcode of the message in flight, `None` when idle.
    #[must_use]
    pub fn opcode(&self) -> Option<OpCode> {
        self.opcode
    }

    /// Whether the in-flight message was sent compressed.
    #[must_use]
    pub fn compressed(&self) -> bool {
        self.compressed
    }

    /// Whether a message is in flight.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }

    /// Concatenate the fragments and clear the in-flight state.
    ///
    /// Returns the message opcode and its complete decoded payload;
    /// `None` when no message is in flight.
    pub fn finish(&mut self) -> Option<(OpCode, Vec<u8>)> {
        let opcode = self.opcode.take()?;
        let mut payload = Vec::with_capacity(self.len);
        for fragment in self.fragments.drain(..) {
            payload.extend_from_slice(&fragment);
        }
        self.compressed = false;
        self.len = 0;
        Some((opcode, payload))
    }

    /// Drop any in-flight message.
    pub fn reset(&mut self) {
        self.opcode = None;
        self.compressed = false;
        self.fragments.clear();
        self.len = 0;
    }
}
