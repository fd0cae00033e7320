//! §4.4 "Masking (encode)" / "Unmasking (decode)": turns a byte stream into
//! a stream of ASCII hint quadruples and padding bytes, and back.
//!
//! Every random decision (padding draw, candidate pick) advances one shared
//! per-session LCG, so a peer replaying the same key and the same cipher-
//! stream boundary sees the same shape it produced.

use super::lcg::Lcg;
use super::permutation::all_permutations_of_4;
use super::tables::CodecTables;

/// Bytes `0x20..=0x2F`: the 16-byte ASCII padding pool. These all have bit 6
/// and bit 7 clear, so they never collide with a hint byte's `0x80` base.
const PADDING_POOL: [u8; 16] = [
    0x20, 0x21, 0x22, 0x23, 0x24, 0x25, 0x26, 0x27, 0x28, 0x29, 0x2a, 0x2b, 0x2c, 0x2d, 0x2e, 0x2f,
];

/// Padding-probability threshold `T = 0.3 * 2^16`, scaled into the top 16
/// bits of the 32-bit draw so it can be compared against a raw `next_u32()`.
const PADDING_THRESHOLD: u32 = ((0.3 * 65536.0) as u32) << 16;

/// Caps a single `mask` call's output so a hostile or malformed input can't
/// be used to force unbounded memory growth downstream.
pub const MAX_OUTPUT_LEN: usize = 128 * 1024;

fn is_hint_candidate(b: u8) -> bool {
    (b & 0xC0) == 0x80 && (b & 0x30) != 0
}

/// Single Bernoulli trial at one padding opportunity: with probability
/// `T/2^32`, advances the RNG once more to pick a pool byte and appends it.
/// Never retries — each opportunity gets exactly one draw, so the number of
/// padding bytes a `mask` call can emit is bounded by its number of
/// opportunities, not by how many consecutive draws happen to succeed.
fn maybe_emit_padding(rng: &mut Lcg, out: &mut Vec<u8>) {
    if rng.next_u32() < PADDING_THRESHOLD {
        let pad = PADDING_POOL[rng.next_below(PADDING_POOL.len() as u32) as usize];
        out.push(pad);
    }
}

/// Obfuscates `plaintext` into a masked ASCII byte stream.
///
/// For each input byte: one padding opportunity, then either a verbatim
/// fallback (if the byte has no table candidates) or a candidate quadruple
/// emitted in a uniformly-chosen permutation order with an independent
/// padding opportunity before each of its four hint bytes. One final
/// padding opportunity follows the last input byte.
pub fn mask(tables: &CodecTables, rng: &mut Lcg, plaintext: &[u8]) -> Vec<u8> {
    let permutations = all_permutations_of_4();
    let mut out = Vec::with_capacity(plaintext.len() * 6 + 32);

    for &byte in plaintext {
        maybe_emit_padding(rng, &mut out);

        let candidates = tables.candidates_for(byte);
        if candidates.is_empty() {
            out.push(byte);
        } else {
            let pick = rng.next_below(candidates.len() as u32) as usize;
            let quad = candidates[pick];

            let perm = permutations[rng.next_below(permutations.len() as u32) as usize];
            for &slot in &perm {
                maybe_emit_padding(rng, &mut out);
                out.push(quad[slot as usize]);
            }
        }

        if out.len() >= MAX_OUTPUT_LEN {
            return out;
        }
    }

    maybe_emit_padding(rng, &mut out);
    out
}

/// Reverses `mask`: scans the masked stream for hint-candidate bytes,
/// accumulates them four at a time, and emits the decoded byte once a
/// quadruple resolves. Non-candidate bytes (padding, or verbatim fallback
/// bytes) are passed straight through when they can't be decoded.
pub struct Unmasker<'a> {
    tables: &'a CodecTables,
    accumulator: [u8; 4],
    accumulated: usize,
}

impl<'a> Unmasker<'a> {
    pub fn new(tables: &'a CodecTables) -> Self {
        Self { tables, accumulator: [0u8; 4], accumulated: 0 }
    }

    /// Rebuilds an `Unmasker` from state saved between calls (so a caller
    /// can hold the accumulator without holding a live borrow of `tables`).
    pub fn restore(tables: &'a CodecTables, accumulator: [u8; 4], accumulated: usize) -> Self {
        Self { tables, accumulator, accumulated }
    }

    pub fn into_state(self) -> ([u8; 4], usize) {
        (self.accumulator, self.accumulated)
    }

    /// Feeds `masked` through the accumulator, returning every decoded byte.
    pub fn feed(&mut self, masked: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(masked.len() / 4 + 1);

        for &b in masked {
            if is_hint_candidate(b) {
                self.accumulator[self.accumulated] = b;
                self.accumulated += 1;
                if self.accumulated == 4 {
                    if let Some(byte) = self.tables.decode_quadruple(self.accumulator) {
                        out.push(byte);
                    }
                    self.accumulated = 0;
                }
            } else if self.accumulated == 0 {
                // Not mid-quadruple: either padding or a verbatim fallback byte.
                // There is no marker distinguishing the two in the wire format,
                // so a byte that never had table candidates round-trips as itself.
                if self.tables.candidates_for(b).is_empty() {
                    out.push(b);
                }
            }
        }

        out
    }
}
