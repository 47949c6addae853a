//! Append-and-consume buffering of owned byte chunks.
//!
//! The queue is the only buffering layer in the receiver: input chunks are
//! pushed as they arrive from the transport and the parser pulls exact spans
//! back out. A span that falls inside the front chunk is handed out without
//! copying; a span straddling chunk boundaries is copied into one buffer.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

/// FIFO of owned byte chunks with exact-length consumption.
#[derive(Debug, Default)]
pub struct ByteQueue {
    chunks: VecDeque<Bytes>,
    len: usize,
}

impl ByteQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunks: VecDeque::new(),
            len: 0,
        }
    }

    /// Append a chunk to the back of the queue. Empty chunks are ignored.
    pub fn push(&mut self, chunk: impl Into<Bytes>) {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return;
        }
        self.len += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// Total buffered bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the queue holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove and return exactly `n` bytes as one contiguous buffer, or
    /// `None` when fewer than `n` bytes are buffered.
    pub fn consume(&mut self, n: usize) -> Option<Bytes> {
        if n > self.len {
            return None;
        }
        if n == 0 {
            return Some(Bytes::new());
        }

        let front = self.chunks.front_mut()?;
        if front.len() >= n {
            let out = front.split_to(n);
            if front.is_empty() {
                self.chunks.pop_front();
            }
            self.len -= n;
            return Some(out);
        }

        // Span straddles chunks: gather into one buffer.
        let mut out = BytesMut::with_capacity(n);
        while out.len() < n {
            let mut chunk = self.chunks.pop_front()?;
            let take = chunk.len().min(n - out.len());
            out.extend_from_slice(&chunk.split_to(take));
            if !chunk.is_empty() {
                self.chunks.push_front(chunk);
            }
        }
        self.len -= n;
        Some(out.freeze())
    }

    /// Return the first `n` bytes without removing them, or `None` when
    /// fewer than `n` bytes are buffered.
    #[must_use]
    pub fn peek(&self, n: usize) -> Option<Bytes> {
        if n > self.len {
            return None;
        }
        if n == 0 {
            return Some(Bytes::new());
        }

        let front = self.chunks.front()?;
        if front.len() >= n {
            return Some(front.slice(..n));
        }

        let mut out = BytesMut::with_capacity(n);
        for chunk in &self.chunks {
            let take = chunk.len().min(n - out.len());
            out.extend_from_slice(&chunk[..take]);
            if out.len() == n {
                break;
            }
        }
        Some(out.freeze())
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.len = 0;
    }
}
