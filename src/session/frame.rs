//! C6: the frame layer — 2-byte big-endian length-prefixed AEAD records.
//!
//! Grounded on the teacher's `ChaCha20Poly1305::decrypt_stream` chunk
//! reader (`pipeline/cipher/chacha.rs`): read the length prefix, then read
//! exactly that many more bytes before handing the record to the caller.
//! The difference from the teacher's stream format is the prefix width (2
//! bytes here, §4.6, vs. the teacher's 4) and that frames arrive over an
//! HTTP long-poll transport rather than a single continuous reader, so the
//! parser must tolerate a frame's bytes landing in arbitrarily many chunks
//! instead of reading from one `Read` to completion.

const LEN_PREFIX: usize = 2;

/// Maximum frame body length a 2-byte big-endian prefix can express.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

pub fn seal_frame(body: &[u8]) -> Vec<u8> {
    debug_assert!(body.len() <= MAX_FRAME_LEN, "frame body exceeds the 2-byte length prefix");
    let mut out = Vec::with_capacity(LEN_PREFIX + body.len());
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend_from_slice(body);
    out
}

/// Reassembles frames from a byte stream that may be split at arbitrary
/// points (spec.md S3): each `push` appends to an internal buffer and
/// `take_frames` drains every frame that has become complete.
#[derive(Default)]
pub struct FrameParser {
    buf: Vec<u8>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Drains every full frame currently buffered, leaving any trailing
    /// partial frame in place for the next `push`.
    pub fn take_frames(&mut self) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        let mut consumed = 0;

        loop {
            let remaining = &self.buf[consumed..];
            if remaining.len() < LEN_PREFIX {
                break;
            }
            let len = u16::from_be_bytes([remaining[0], remaining[1]]) as usize;
            if remaining.len() < LEN_PREFIX + len {
                break;
            }
            frames.push(remaining[LEN_PREFIX..LEN_PREFIX + len].to_vec());
            consumed += LEN_PREFIX + len;
        }

        self.buf.drain(..consumed);
        frames
    }
}
