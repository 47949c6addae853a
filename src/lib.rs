//! # rxws - Streaming WebSocket Frame Receiver
//!
//! `rxws` is a push-driven, RFC 6455 compliant WebSocket receive path:
//! feed it raw transport bytes in chunks of any size and it emits fully
//! reassembled messages through callbacks.
//!
//! ## Features
//!
//! - **Incremental parsing** across arbitrary chunk boundaries, including
//!   headers split mid-byte-pair
//! - **Strict RFC 6455 validation** of fragmentation, reserved bits, and
//!   control-frame rules
//! - **permessage-deflate** (RFC 7692) decompression with streaming
//!   per-message state
//! - **Cumulative payload caps** that survive fragmentation and
//!   compressed expansion
//! - **Transport-agnostic**: no I/O, no runtime dependency
//!
//! ## Quick Start
//!
//! ```rust
//! use rxws::{Config, Receiver};
//!
//! let mut receiver = Receiver::new(Config::new().with_max_payload(16 * 1024 * 1024));
//! receiver.on_text = Some(Box::new(|text| println!("text: {text}")));
//! receiver.on_error = Some(Box::new(|err| eprintln!("fatal: {err}")));
//!
//! // Bytes arrive from the transport however they arrive.
//! receiver.add(&[0x81, 0x03]);
//! receiver.add(b"abc");
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod extensions;
pub mod message;
pub mod protocol;
pub mod receiver;

pub use buffer::ByteQueue;
pub use config::{Config, Role};
pub use error::{Error, Result};
pub use message::{CloseCode, CloseFrame};
pub use protocol::{FrameHeader, OpCode};
pub use receiver::Receiver;

#[cfg(feature = "compression")]
pub use extensions::deflate::{DeflateConfig, PermessageDeflate};
