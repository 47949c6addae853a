//! Payload masking (RFC 6455 Section 5.3).
//!
//! Client-to-server payloads are XOR-masked with a 4-byte key. Unmasking
//! must be resumable at an arbitrary byte offset so a payload can be
//! processed as its chunks arrive.

/// XOR `data` in place with `key`, starting at mask offset 0.
#[inline]
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    apply_mask_offset(data, key, 0);
}

/// XOR `data` in place with `key`, as if `data` started `offset` bytes
/// into the payload.
///
/// Masking is an involution, so the same call unmasks.
pub fn apply_mask_offset(data: &mut [u8], key: [u8; 4], offset: usize) {
    // Rotate the key so the word-wise fast path lines up with the offset.
    let rotated = [
        key[offset % 4],
        key[(offset + 1) % 4],
        key[(offset + 2) % 4],
        key[(offset + 3) % 4],
    ];
    let key_word = u32::from_ne_bytes(rotated);

    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(word ^ key_word).to_ne_bytes());
    }
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= rotated[i % 4];
    }
}
