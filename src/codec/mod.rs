//! C4: the Sudoku-grid obfuscation codec (§4.4).
//!
//! [`grids`] and [`lcg`] are the process-wide and keyed primitives;
//! [`tables`] builds the per-key encode/decode tables from them;
//! [`mask`] is the byte-stream transform built on top of those tables.

pub mod grids;
pub mod lcg;
pub mod mask;
pub mod permutation;
pub mod tables;

use lcg::Lcg;
use tables::CodecTables;

/// A session's codec state: the keyed tables plus the live LCG that both
/// `mask` and `Unmasker` advance in lockstep with the peer.
pub struct Codec {
    tables: CodecTables,
    rng: Lcg,
    unmasker_state: [u8; 4],
    unmasker_len: usize,
}

impl Codec {
    /// Builds the keyed tables and seeds the session-local LCG from the
    /// same key material (§4.4: the masking LCG is independent from, but
    /// seeded the same way as, the table-construction LCG).
    pub fn new(key: &[u8]) -> Self {
        Self {
            tables: CodecTables::build(key),
            rng: Lcg::from_key_seed(key),
            unmasker_state: [0u8; 4],
            unmasker_len: 0,
        }
    }

    pub fn mask(&mut self, plaintext: &[u8]) -> Vec<u8> {
        mask::mask(&self.tables, &mut self.rng, plaintext)
    }

    /// Feeds a chunk of masked bytes through the decode accumulator,
    /// returning whatever full bytes resolved. Safe to call with chunks
    /// that split a hint quadruple across arbitrary boundaries.
    pub fn unmask(&mut self, masked: &[u8]) -> Vec<u8> {
        let mut unmasker = mask::Unmasker::restore(&self.tables, self.unmasker_state, self.unmasker_len);
        let out = unmasker.feed(masked);
        let (state, len) = unmasker.into_state();
        self.unmasker_state = state;
        self.unmasker_len = len;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_mask_unmask_roundtrip_across_split_calls() {
        let mut encoder = Codec::new(&[1u8; 32]);
        let mut decoder = Codec::new(&[1u8; 32]);
        let plaintext = b"roundtrip across independent codec instances".to_vec();

        let masked = encoder.mask(&plaintext);

        let mut decoded = Vec::new();
        for chunk in masked.chunks(5) {
            decoded.extend(decoder.unmask(chunk));
        }

        assert_eq!(decoded, plaintext);
    }
}
