//! ChaCha20 core (RFC 8439 IETF variant).
//!
//! 256-bit key, 96-bit nonce, 32-bit block counter, 64-byte blocks. This
//! module only produces keystream; it performs no authentication and no
//! buffering of application framing — that's `crypto::aead`'s job.

const CONSTANTS: [u32; 4] = [
    0x6170_7865, // "expa"
    0x3320_646e, // "nd 3"
    0x7962_2d32, // "2-by"
    0x6b20_6574, // "te k"
];

#[inline(always)]
fn quarter_round(state: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    state[a] = state[a].wrapping_add(state[b]);
    state[d] ^= state[a];
    state[d] = state[d].rotate_left(16);

    state[c] = state[c].wrapping_add(state[d]);
    state[b] ^= state[c];
    state[b] = state[b].rotate_left(12);

    state[a] = state[a].wrapping_add(state[b]);
    state[d] ^= state[a];
    state[d] = state[d].rotate_left(8);

    state[c] = state[c].wrapping_add(state[d]);
    state[b] ^= state[c];
    state[b] = state[b].rotate_left(7);
}

fn rounds(state: &mut [u32; 16]) {
    for _ in 0..10 {
        quarter_round(state, 0, 4, 8, 12);
        quarter_round(state, 1, 5, 9, 13);
        quarter_round(state, 2, 6, 10, 14);
        quarter_round(state, 3, 7, 11, 15);

        quarter_round(state, 0, 5, 10, 15);
        quarter_round(state, 1, 6, 11, 12);
        quarter_round(state, 2, 7, 8, 13);
        quarter_round(state, 3, 4, 9, 14);
    }
}

/// One ChaCha20 cipher instance bound to a `(key, nonce)` pair.
///
/// Exposes a running keystream cursor: each `xor` call consumes from the
/// current block and advances the counter as needed, buffering the unused
/// tail of a block across calls (the caller may feed arbitrary chunk
/// sizes, not just 64-byte-aligned ones).
pub struct ChaCha20 {
    key: [u32; 8],
    nonce: [u32; 3],
    counter: u32,
    keystream: [u8; 64],
    /// Byte offset into `keystream` not yet consumed by `xor`.
    offset: usize,
}

impl ChaCha20 {
    /// Loads state and sets the counter to `counter`. The only failure mode
    /// (per §4.1) is a bad key/nonce length, which this signature makes
    /// unrepresentable by taking fixed-size arrays.
    pub fn init(key: &[u8; 32], nonce: &[u8; 12], counter: u32) -> Self {
        let mut key_words = [0u32; 8];
        for (w, chunk) in key_words.iter_mut().zip(key.chunks_exact(4)) {
            *w = u32::from_le_bytes(chunk.try_into().unwrap());
        }
        let mut nonce_words = [0u32; 3];
        for (w, chunk) in nonce_words.iter_mut().zip(nonce.chunks_exact(4)) {
            *w = u32::from_le_bytes(chunk.try_into().unwrap());
        }
        Self {
            key: key_words,
            nonce: nonce_words,
            counter,
            keystream: [0u8; 64],
            // Force the first `xor`/`keystream_block` call to regenerate.
            offset: 64,
        }
    }

    fn state(&self) -> [u32; 16] {
        let mut state = [0u32; 16];
        state[0..4].copy_from_slice(&CONSTANTS);
        state[4..12].copy_from_slice(&self.key);
        state[12] = self.counter;
        state[13..16].copy_from_slice(&self.nonce);
        state
    }

    /// Produces one 64-byte keystream block and advances the counter.
    pub fn keystream_block(&mut self) -> [u8; 64] {
        let original = self.state();
        let mut state = original;
        rounds(&mut state);
        for (s, o) in state.iter_mut().zip(&original) {
            *s = s.wrapping_add(*o);
        }

        let mut out = [0u8; 64];
        for (chunk, word) in out.chunks_exact_mut(4).zip(&state) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        self.counter = self.counter.wrapping_add(1);
        out
    }

    /// XORs `src` into `dst` with the running keystream, preserving the
    /// cursor across calls (§4.1: "buffer the unused keystream tail").
    pub fn xor(&mut self, dst: &mut [u8], src: &[u8]) {
        assert_eq!(dst.len(), src.len());
        let mut i = 0;
        while i < src.len() {
            if self.offset == 64 {
                self.keystream = self.keystream_block();
                self.offset = 0;
            }
            let take = (64 - self.offset).min(src.len() - i);
            for j in 0..take {
                dst[i + j] = src[i + j] ^ self.keystream[self.offset + j];
            }
            self.offset += take;
            i += take;
        }
    }

    /// Derives the Poly1305 one-time key: counter is forced to 0, one block
    /// is produced, its first 32 bytes returned, then the counter (and
    /// keystream cursor) are reset so the caller continues at counter = 1.
    pub fn derive_poly_key(key: &[u8; 32], nonce: &[u8; 12]) -> ([u8; 32], Self) {
        let mut cipher = Self::init(key, nonce, 0);
        let block0 = cipher.keystream_block();
        let mut poly_key = [0u8; 32];
        poly_key.copy_from_slice(&block0[..32]);
        // Counter is now 1 after producing block 0 — exactly where RFC 8439
        // wants encryption to begin. Keystream cursor is empty (offset=64)
        // so the next `xor` call generates block 1 fresh.
        (poly_key, cipher)
    }
}
