//! Shared helpers for receiver integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use rxws::{Config, Receiver};

/// Everything a receiver can report, flattened for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close(u16, String),
    Error(String, u16),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

/// Build a receiver with every callback recording into a shared log.
pub fn wired(config: Config) -> (Receiver, EventLog) {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let mut receiver = Receiver::new(config);

    let sink = log.clone();
    receiver.on_text = Some(Box::new(move |text| {
        sink.lock().unwrap().push(Event::Text(text));
    }));
    let sink = log.clone();
    receiver.on_binary = Some(Box::new(move |data| {
        sink.lock().unwrap().push(Event::Binary(data));
    }));
    let sink = log.clone();
    receiver.on_ping = Some(Box::new(move |data| {
        sink.lock().unwrap().push(Event::Ping(data));
    }));
    let sink = log.clone();
    receiver.on_pong = Some(Box::new(move |data| {
        sink.lock().unwrap().push(Event::Pong(data));
    }));
    let sink = log.clone();
    receiver.on_close = Some(Box::new(move |code, reason| {
        sink.lock().unwrap().push(Event::Close(code.as_u16(), reason));
    }));
    let sink = log.clone();
    receiver.on_error = Some(Box::new(move |err| {
        sink.lock()
            .unwrap()
            .push(Event::Error(err.to_string(), err.close_code()));
    }));

    (receiver, log)
}

/// Snapshot the recorded events.
pub fn events(log: &EventLog) -> Vec<Event> {
    log.lock().unwrap().clone()
}

/// Decode a hex string into bytes.
pub fn hex(s: &str) -> Vec<u8> {
    assert!(s.len() % 2 == 0, "odd hex length");
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).expect("invalid hex"))
        .collect()
}

/// Serialize one frame, masking the payload when a key is given.
pub fn frame(fin: bool, rsv1: bool, opcode: u8, mask: Option<[u8; 4]>, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 14);

    let mut byte0 = opcode & 0x0F;
    if fin {
        byte0 |= 0x80;
    }
    if rsv1 {
        byte0 |= 0x40;
    }
    out.push(byte0);

    let masked_bit = if mask.is_some() { 0x80 } else { 0x00 };
    if payload.len() <= 125 {
        out.push(masked_bit | payload.len() as u8);
    } else if payload.len() <= 65535 {
        out.push(masked_bit | 126);
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    } else {
        out.push(masked_bit | 127);
        out.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    }

    match mask {
        Some(key) => {
            out.extend_from_slice(&key);
            out.extend(payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
        }
        None => out.extend_from_slice(payload),
    }

    out
}

pub mod deflate {
    //! Sender-side compression for building test vectors, mirroring what
    //! a permessage-deflate peer puts on the wire.

    use flate2::{Compress, Compression, FlushCompress};

    const TRAILER: [u8; 4] = [0x00, 0x00, 0xff, 0xff];

    /// Fresh raw-deflate compressor with the default 15-bit window.
    pub fn compressor() -> Compress {
        Compress::new_with_window_bits(Compression::default(), false, 15)
    }

    /// Sync-flush `data`, keeping the flush tail. This is the wire form
    /// of a non-final fragment.
    pub fn compress_fragment(compressor: &mut Compress, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() + 32);
        let mut pos = 0;
        loop {
            let old_len = out.len();
            out.resize(old_len + 4096, 0);
            let before_in = compressor.total_in();
            let before_out = compressor.total_out();
            compressor
                .compress(&data[pos..], &mut out[old_len..], FlushCompress::Sync)
                .unwrap();
            pos += (compressor.total_in() - before_in) as usize;
            let produced = (compressor.total_out() - before_out) as usize;
            out.truncate(old_len + produced);
            if pos == data.len() && produced < 4096 {
                break;
            }
        }
        out
    }

    /// Sync-flush `data` and strip the final 4-byte tail. This is the
    /// wire form of a message's last (or only) fragment.
    pub fn compress_final(compressor: &mut Compress, data: &[u8]) -> Vec<u8> {
        let mut out = compress_fragment(compressor, data);
        assert!(out.ends_with(&TRAILER));
        out.truncate(out.len() - TRAILER.len());
        out
    }
}
