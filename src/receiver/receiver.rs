//! The push-driven receive state machine.
//!
//! A [`Receiver`] is fed raw transport bytes through [`Receiver::add`] and
//! reports completed messages through its callback fields. It never reads a
//! socket itself and never returns an error across the `add` boundary:
//! every failure surfaces exactly once through `on_error`, after which the
//! receiver is dead and silently discards input.

use bytes::Bytes;
use tracing::{debug, trace};

use crate::buffer::ByteQueue;
use crate::config::Config;
use crate::error::{Error, Result};
#[cfg(feature = "compression")]
use crate::extensions::deflate::PermessageDeflate;
use crate::message::{CloseCode, CloseFrame};
use crate::protocol::header::{self, FrameHeader, LengthCode};
use crate::protocol::mask::apply_mask;
use crate::protocol::opcode::OpCode;
use crate::receiver::assembler::MessageAssembler;

/// Handler for completed text messages.
pub type TextHandler = Box<dyn FnMut(String) + Send>;
/// Handler for completed binary messages.
pub type BinaryHandler = Box<dyn FnMut(Vec<u8>) + Send>;
/// Handler for ping/pong control payloads.
pub type ControlHandler = Box<dyn FnMut(Vec<u8>) + Send>;
/// Handler for a parsed close frame body.
pub type CloseHandler = Box<dyn FnMut(CloseCode, String) + Send>;
/// Handler for the terminal error.
pub type ErrorHandler = Box<dyn FnMut(Error) + Send>;

/// Parsing stage of the frame currently in flight.
///
/// The descriptor travels inside the variants, so a frame split at any
/// byte boundary resumes exactly where the previous chunk left off.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for the fixed 2-byte header prefix.
    Header,
    /// Waiting for a 2-byte extended length.
    Length16 { header: FrameHeader },
    /// Waiting for an 8-byte extended length.
    Length64 { header: FrameHeader },
    /// Waiting for the 4-byte mask key.
    MaskKey { header: FrameHeader },
    /// Waiting for `payload_len` bytes of payload.
    Payload { header: FrameHeader },
    /// Payload handed to the deflate collaborator.
    #[cfg_attr(not(feature = "compression"), allow(dead_code))]
    Inflating,
    /// Terminal: input is discarded without parsing.
    Dead,
}

/// Outcome of one state-machine step.
enum Step {
    /// State advanced; pump again.
    Advanced,
    /// Not enough buffered bytes, or the receiver is dead.
    Stalled,
}

/// Streaming WebSocket frame receiver (RFC 6455).
///
/// One receiver serves one connection. Feed it transport bytes in chunks
/// of any size; it reassembles fragmented messages, dispatches interleaved
/// control frames in arrival order, inflates `permessage-deflate` traffic,
/// and enforces the cumulative payload cap.
///
/// ```rust
/// use rxws::{Config, Receiver};
///
/// let mut receiver = Receiver::new(Config::new());
/// receiver.on_text = Some(Box::new(|text| println!("got: {text}")));
/// receiver.add(&[0x81, 0x05, b'H', b'e', b'l', b'l', b'o']);
/// ```
pub struct Receiver {
    queue: ByteQueue,
    state: State,
    assembler: MessageAssembler,
    total_payload_length: u64,
    max_payload: u64,
    #[cfg(feature = "compression")]
    deflate: Option<PermessageDeflate>,

    /// Called with each completed text message.
    pub on_text: Option<TextHandler>,
    /// Called with each completed binary message.
    pub on_binary: Option<BinaryHandler>,
    /// Called with each ping payload.
    pub on_ping: Option<ControlHandler>,
    /// Called with each pong payload.
    pub on_pong: Option<ControlHandler>,
    /// Called once with the parsed close frame body.
    pub on_close: Option<CloseHandler>,
    /// Called once with the terminal error; all other handlers are
    /// detached first.
    pub on_error: Option<ErrorHandler>,
}

impl Receiver {
    /// Create a receiver from its configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        #[cfg(feature = "compression")]
        let deflate = config.deflate.map(|deflate_config| {
            let mut deflate = PermessageDeflate::new(deflate_config);
            deflate.set_max_payload(config.max_payload);
            deflate
        });

        Self {
            queue: ByteQueue::new(),
            state: State::Header,
            assembler: MessageAssembler::new(),
            total_payload_length: 0,
            max_payload: config.max_payload,
            #[cfg(feature = "compression")]
            deflate,
            on_text: None,
            on_binary: None,
            on_ping: None,
            on_pong: None,
            on_close: None,
            on_error: None,
        }
    }

    /// Feed a chunk of transport bytes and pump the state machine.
    ///
    /// Chunk boundaries are arbitrary: a chunk may hold part of a header,
    /// several whole frames, or anything in between. Callbacks fire in
    /// byte order before this returns. Once the receiver is dead the
    /// chunk is dropped without parsing.
    pub fn add(&mut self, data: &[u8]) {
        if matches!(self.state, State::Dead) {
            return;
        }
        self.queue.push(Bytes::copy_from_slice(data));
        self.pump();
    }

    /// Sum of the payload lengths of the non-final fragments of the
    /// in-flight message; 0 when idle.
    #[must_use]
    pub fn total_payload_length(&self) -> u64 {
        self.total_payload_length
    }

    /// Whether the receiver has terminated (close frame, error, or
    /// [`cleanup`](Self::cleanup)).
    #[must_use]
    pub fn is_dead(&self) -> bool {
        matches!(self.state, State::Dead)
    }

    /// Release buffered input, the deflate collaborator, and all
    /// callbacks. Subsequent [`add`](Self::add) calls are no-ops.
    pub fn cleanup(&mut self) {
        debug!("receiver cleanup");
        self.queue.clear();
        self.assembler.reset();
        self.total_payload_length = 0;
        #[cfg(feature = "compression")]
        if let Some(mut deflate) = self.deflate.take() {
            deflate.cleanup();
        }
        self.detach_handlers();
        self.on_error = None;
        self.state = State::Dead;
    }

    fn pump(&mut self) {
        loop {
            match self.step() {
                Ok(Step::Advanced) => {}
                Ok(Step::Stalled) => return,
                Err(err) => return self.fail(err),
            }
        }
    }

    fn step(&mut self) -> Result<Step> {
        match self.state {
            State::Header => {
                let Some(bytes) = self.queue.consume(2) else {
                    return Ok(Step::Stalled);
                };
                let (header, code) = header::parse_fixed([bytes[0], bytes[1]])?;
                match code {
                    LengthCode::Inline(_) => self.frame_length_known(header)?,
                    LengthCode::U16 => self.state = State::Length16 { header },
                    LengthCode::U64 => self.state = State::Length64 { header },
                }
                Ok(Step::Advanced)
            }
            State::Length16 { mut header } => {
                let Some(bytes) = self.queue.consume(2) else {
                    return Ok(Step::Stalled);
                };
                header.payload_len = header::decode_len16([bytes[0], bytes[1]]);
                self.frame_length_known(header)?;
                Ok(Step::Advanced)
            }
            State::Length64 { mut header } => {
                let Some(bytes) = self.queue.consume(8) else {
                    return Ok(Step::Stalled);
                };
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes);
                header.payload_len = header::decode_len64(raw)?;
                self.frame_length_known(header)?;
                Ok(Step::Advanced)
            }
            State::MaskKey { mut header } => {
                let Some(bytes) = self.queue.consume(4) else {
                    return Ok(Step::Stalled);
                };
                header.mask_key.copy_from_slice(&bytes);
                self.state = State::Payload { header };
                Ok(Step::Advanced)
            }
            State::Payload { header } => {
                let len = usize::try_from(header.payload_len).map_err(|_| {
                    Error::MessageTooLarge {
                        size: header.payload_len,
                        max: usize::MAX as u64,
                    }
                })?;
                let Some(bytes) = self.queue.consume(len) else {
                    return Ok(Step::Stalled);
                };
                let mut payload: Vec<u8> = bytes.into();
                if header.masked {
                    apply_mask(&mut payload, header.mask_key);
                }
                self.dispatch(header, payload)?;
                Ok(Step::Advanced)
            }
            State::Inflating | State::Dead => Ok(Step::Stalled),
        }
    }

    /// The payload length is final: run header validation, fragmentation
    /// context checks, and the cumulative cap, then route to the mask or
    /// payload stage.
    fn frame_length_known(&mut self, header: FrameHeader) -> Result<()> {
        header.validate(self.deflate_installed())?;

        if header.opcode.is_data() {
            if header.opcode == OpCode::Continuation {
                if !self.assembler.is_assembling() {
                    return Err(Error::UnexpectedContinuation);
                }
            } else if self.assembler.is_assembling() {
                return Err(Error::ExpectedContinuation);
            }

            // Enforced before the payload is buffered, so an oversized
            // announcement dies on its header.
            let projected = self.total_payload_length.saturating_add(header.payload_len);
            if self.max_payload > 0 && projected > self.max_payload {
                return Err(Error::MessageTooLarge {
                    size: projected,
                    max: self.max_payload,
                });
            }
        }

        self.state = if header.masked {
            State::MaskKey { header }
        } else {
            State::Payload { header }
        };
        Ok(())
    }

    fn dispatch(&mut self, header: FrameHeader, payload: Vec<u8>) -> Result<()> {
        trace!(
            opcode = ?header.opcode,
            fin = header.fin,
            len = payload.len(),
            "frame received"
        );

        match header.opcode {
            OpCode::Ping => {
                if let Some(on_ping) = self.on_ping.as_mut() {
                    on_ping(payload);
                }
                self.state = State::Header;
                Ok(())
            }
            OpCode::Pong => {
                if let Some(on_pong) = self.on_pong.as_mut() {
                    on_pong(payload);
                }
                self.state = State::Header;
                Ok(())
            }
            OpCode::Close => {
                let close = parse_close(&payload)?;
                debug!(code = close.code.as_u16(), "close frame received");
                self.state = State::Dead;
                self.queue.clear();
                if let Some(on_close) = self.on_close.as_mut() {
                    on_close(close.code, close.reason);
                }
                Ok(())
            }
            OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                self.dispatch_data(header, payload)
            }
        }
    }

    fn dispatch_data(&mut self, header: FrameHeader, payload: Vec<u8>) -> Result<()> {
        if header.opcode != OpCode::Continuation {
            self.assembler.start(header.opcode, header.rsv1);
        }

        let decoded = self.decode_payload(&header, payload)?;
        self.assembler.append(decoded);

        if header.fin {
            // Reset before the callback so a handler inspecting the
            // receiver sees idle accounting.
            self.total_payload_length = 0;
            if let Some((opcode, data)) = self.assembler.finish() {
                if opcode == OpCode::Text {
                    let text = String::from_utf8(data)?;
                    if let Some(on_text) = self.on_text.as_mut() {
                        on_text(text);
                    }
                } else if let Some(on_binary) = self.on_binary.as_mut() {
                    on_binary(data);
                }
            }
        } else {
            self.total_payload_length = self
                .total_payload_length
                .saturating_add(header.payload_len);
        }

        self.state = State::Header;
        Ok(())
    }

    /// Inflate a compressed frame's payload; plain payloads pass through.
    #[cfg(feature = "compression")]
    fn decode_payload(&mut self, header: &FrameHeader, payload: Vec<u8>) -> Result<Vec<u8>> {
        if self.assembler.compressed() {
            if let Some(deflate) = self.deflate.as_mut() {
                self.state = State::Inflating;
                return deflate.decompress(&payload, header.fin);
            }
        }
        Ok(payload)
    }

    #[cfg(not(feature = "compression"))]
    fn decode_payload(&mut self, _header: &FrameHeader, payload: Vec<u8>) -> Result<Vec<u8>> {
        Ok(payload)
    }

    fn deflate_installed(&self) -> bool {
        #[cfg(feature = "compression")]
        {
            self.deflate.is_some()
        }
        #[cfg(not(feature = "compression"))]
        {
            false
        }
    }

    fn detach_handlers(&mut self) {
        self.on_text = None;
        self.on_binary = None;
        self.on_ping = None;
        self.on_pong = None;
        self.on_close = None;
    }

    /// Terminal error path: detach every handler, mark the receiver dead,
    /// then report through `on_error` exactly once.
    fn fail(&mut self, err: Error) {
        debug!(code = err.close_code(), error = %err, "receiver terminated");
        self.state = State::Dead;
        self.queue.clear();
        self.assembler.reset();
        self.detach_handlers();
        if let Some(mut on_error) = self.on_error.take() {
            on_error(err);
        }
    }
}

/// Parse a close frame body: optional 2-byte big-endian code plus UTF-8
/// reason. An empty body reports the synthetic 1005 "no status" code; a
/// 1-byte body is malformed (RFC 6455 Section 5.5.1).
fn parse_close(payload: &[u8]) -> Result<CloseFrame> {
    match payload.len() {
        0 => Ok(CloseFrame::new(CloseCode::NoStatus, "")),
        1 => Err(Error::Protocol("close frame with 1-byte payload".into())),
        _ => {
            let code = CloseCode::from_u16(u16::from_be_bytes([payload[0], payload[1]]));
            let reason = std::str::from_utf8(&payload[2..])?.to_string();
            Ok(CloseFrame::new(code, reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Text(String),
        Binary(Vec<u8>),
        Ping(Vec<u8>),
        Pong(Vec<u8>),
        Close(u16, String),
        Error(u16),
    }

    fn wired(config: Config) -> (Receiver, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut receiver = Receiver::new(config);

        let sink = events.clone();
        receiver.on_text = Some(Box::new(move |text| {
            sink.lock().unwrap().push(Event::Text(text));
        }));
        let sink = events.clone();
        receiver.on_binary = Some(Box::new(move |data| {
            sink.lock().unwrap().push(Event::Binary(data));
        }));
        let sink = events.clone();
        receiver.on_ping = Some(Box::new(move |data| {
            sink.lock().unwrap().push(Event::Ping(data));
        }));
        let sink = events.clone();
        receiver.on_pong = Some(Box::new(move |data| {
            sink.lock().unwrap().push(Event::Pong(data));
        }));
        let sink = events.clone();
        receiver.on_close = Some(Box::new(move |code, reason| {
            sink.lock().unwrap().push(Event::Close(code.as_u16(), reason));
        }));
        let sink = events.clone();
        receiver.on_error = Some(Box::new(move |err| {
            sink.lock().unwrap().push(Event::Error(err.close_code()));
        }));

        (receiver, events)
    }

    fn taken(events: &Arc<Mutex<Vec<Event>>>) -> Vec<Event> {
        events.lock().unwrap().clone()
    }

    #[test]
    fn test_unmasked_text() {
        let (mut receiver, events) = wired(Config::new());
        receiver.add(&[0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f]);
        assert_eq!(taken(&events), vec![Event::Text("Hello".into())]);
    }

    #[test]
    fn test_header_split_mid_byte_pair() {
        let (mut receiver, events) = wired(Config::new());
        receiver.add(&[0x81]);
        assert!(taken(&events).is_empty());
        receiver.add(&[0x05, 0x48, 0x65]);
        receiver.add(&[0x6c, 0x6c, 0x6f]);
        assert_eq!(taken(&events), vec![Event::Text("Hello".into())]);
    }

    #[test]
    fn test_binary_roundtrip() {
        let (mut receiver, events) = wired(Config::new());
        receiver.add(&[0x82, 0x03, 0x01, 0x02, 0x03]);
        assert_eq!(taken(&events), vec![Event::Binary(vec![1, 2, 3])]);
    }

    #[test]
    fn test_ping_pong() {
        let (mut receiver, events) = wired(Config::new());
        receiver.add(&[0x89, 0x02, 0x68, 0x69]);
        receiver.add(&[0x8A, 0x02, 0x68, 0x69]);
        assert_eq!(
            taken(&events),
            vec![Event::Ping(b"hi".to_vec()), Event::Pong(b"hi".to_vec())]
        );
    }

    #[test]
    fn test_empty_close_reports_no_status() {
        let (mut receiver, events) = wired(Config::new());
        receiver.add(&[0x88, 0x00]);
        assert_eq!(taken(&events), vec![Event::Close(1005, String::new())]);
        assert!(receiver.is_dead());
    }

    #[test]
    fn test_close_with_code_and_reason() {
        let (mut receiver, events) = wired(Config::new());
        receiver.add(&[0x88, 0x06, 0x03, 0xE8, 0x62, 0x79, 0x65, 0x21]);
        assert_eq!(taken(&events), vec![Event::Close(1000, "bye!".into())]);
    }

    #[test]
    fn test_one_byte_close_is_protocol_error() {
        let (mut receiver, events) = wired(Config::new());
        receiver.add(&[0x88, 0x01, 0x03]);
        assert_eq!(taken(&events), vec![Event::Error(1002)]);
    }

    #[test]
    fn test_input_after_close_dropped() {
        let (mut receiver, events) = wired(Config::new());
        receiver.add(&[0x88, 0x00]);
        receiver.add(&[0x81, 0x02, 0x68, 0x69]);
        assert_eq!(taken(&events), vec![Event::Close(1005, String::new())]);
    }

    #[test]
    fn test_unsolicited_continuation_fails() {
        let (mut receiver, events) = wired(Config::new());
        receiver.add(&[0x80, 0x02, 0x68, 0x69]);
        assert_eq!(taken(&events), vec![Event::Error(1002)]);
    }

    #[test]
    fn test_interleaved_data_frame_fails() {
        let (mut receiver, events) = wired(Config::new());
        receiver.add(&[0x01, 0x02, 0x68, 0x69]); // text, fin=0
        receiver.add(&[0x81, 0x02, 0x68, 0x69]); // new text before continuation
        assert_eq!(taken(&events), vec![Event::Error(1002)]);
    }

    #[test]
    fn test_rsv1_without_deflate_fails() {
        let (mut receiver, events) = wired(Config::new());
        receiver.add(&[0xC1, 0x02, 0x68, 0x69]);
        assert_eq!(taken(&events), vec![Event::Error(1002)]);
    }

    #[test]
    fn test_error_detaches_all_handlers() {
        let (mut receiver, events) = wired(Config::new());
        receiver.add(&[0x83, 0x00]); // reserved opcode
        assert_eq!(taken(&events), vec![Event::Error(1002)]);
        assert!(receiver.on_error.is_none());
        assert!(receiver.on_text.is_none());

        // A handler attached after death sees nothing.
        let sink = events.clone();
        receiver.on_text = Some(Box::new(move |text| {
            sink.lock().unwrap().push(Event::Text(text));
        }));
        receiver.add(&[0x81, 0x02, 0x68, 0x69]);
        assert_eq!(taken(&events), vec![Event::Error(1002)]);
    }

    #[test]
    fn test_total_payload_length_accounting() {
        let (mut receiver, events) = wired(Config::new().with_max_payload(10));
        assert_eq!(receiver.total_payload_length(), 0);

        receiver.add(&[0x01, 0x02, 0x48, 0x65]); // "He", fin=0
        assert_eq!(receiver.total_payload_length(), 2);

        receiver.add(&[0x80, 0x03, 0x6c, 0x6c, 0x6f]); // "llo", fin=1
        assert_eq!(receiver.total_payload_length(), 0);
        assert_eq!(taken(&events), vec![Event::Text("Hello".into())]);
    }

    #[test]
    fn test_control_frame_does_not_touch_accounting() {
        let (mut receiver, _) = wired(Config::new().with_max_payload(100));
        receiver.add(&[0x01, 0x02, 0x48, 0x65]);
        receiver.add(&[0x89, 0x00]); // ping
        assert_eq!(receiver.total_payload_length(), 2);
    }

    #[test]
    fn test_max_payload_single_frame() {
        let (mut receiver, events) = wired(Config::new().with_max_payload(4));
        receiver.add(&[0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f]);
        assert_eq!(taken(&events), vec![Event::Error(1009)]);
    }

    #[test]
    fn test_max_payload_across_fragments() {
        let (mut receiver, events) = wired(Config::new().with_max_payload(4));
        receiver.add(&[0x01, 0x03, 0x48, 0x65, 0x6c]);
        receiver.add(&[0x80, 0x02, 0x6c, 0x6f]);
        assert_eq!(taken(&events), vec![Event::Error(1009)]);
    }

    #[test]
    fn test_invalid_utf8_text_fails() {
        let (mut receiver, events) = wired(Config::new());
        receiver.add(&[0x81, 0x02, 0xC3, 0x28]);
        assert_eq!(taken(&events), vec![Event::Error(1007)]);
    }

    #[test]
    fn test_cleanup_silences_receiver() {
        let (mut receiver, events) = wired(Config::new());
        receiver.cleanup();
        receiver.add(&[0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f]);
        assert!(taken(&events).is_empty());
        assert!(receiver.is_dead());

        // Idempotent.
        receiver.cleanup();
    }

    #[test]
    fn test_masked_frame_unmasked_payload() {
        let (mut receiver, events) = wired(Config::new());
        receiver.add(&[
            0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
        ]);
        assert_eq!(taken(&events), vec![Event::Text("Hello".into())]);
    }
}
