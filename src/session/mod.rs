//! C5: per-connection session state — the value type gluing the AEAD
//! engine (C3), the frame layer (C6), and the Sudoku codec (C4) into the
//! send/receive pipelines described in §2's data-flow diagram.
//!
//! A `Session` owns no hidden singletons: the only thing shared across
//! sessions is the process-wide grid/position data each `Codec` borrows
//! from indirectly via `CodecTables::build`.

pub mod frame;

use std::collections::VecDeque;
use std::time::Instant;

use crate::codec::Codec;
use crate::crypto::{self, CipherKind};

#[derive(Debug)]
pub enum Error {
    Crypto(crypto::Error),
    /// The 64-bit send-nonce counter is one seal away from wrapping.
    NonceExhausted,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Crypto(e) => write!(f, "{e}"),
            Self::NonceExhausted => write!(f, "send-nonce counter exhausted"),
        }
    }
}

impl std::error::Error for Error {}

impl From<crypto::Error> for Error {
    fn from(e: crypto::Error) -> Self {
        Self::Crypto(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// §6's hint-encoding space selector. Only `Ascii` is fully specified.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Layout {
    Ascii,
    Entropy,
}

impl Layout {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ascii" => Some(Self::Ascii),
            "entropy" => Some(Self::Entropy),
            _ => None,
        }
    }
}

pub struct Session {
    /// Always the full 32 bytes (§3): the codec tables are keyed off the
    /// whole thing regardless of which AEAD mode only needs a prefix of it.
    key: [u8; 32],
    cipher: CipherKind,
    layout: Layout,
    send_nonce_counter: u64,
    recv_nonce_counter: u64,
    codec: Codec,
    frame_parser: frame::FrameParser,
    /// Already-masked frames waiting to be drained by the poll `stream`
    /// handler or the WebSocket writer.
    outbound: VecDeque<Vec<u8>>,
    closed: bool,
    last_activity: Instant,
}

impl Session {
    /// §4.5's `create(key, cipher, layout)`. Codec tables are rebuilt from
    /// `key` — the process-wide grid/combination data they're built from is
    /// cheap enough to not need memoizing across sessions that share a key.
    pub fn create(key: [u8; 32], cipher: CipherKind, layout: Layout) -> Self {
        let codec = Codec::new(&key);
        Self {
            key,
            cipher,
            layout,
            send_nonce_counter: 0,
            recv_nonce_counter: 0,
            codec,
            frame_parser: frame::FrameParser::new(),
            outbound: VecDeque::new(),
            closed: false,
            last_activity: Instant::now(),
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn closed(&self) -> bool {
        self.closed
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> std::time::Duration {
        self.last_activity.elapsed()
    }

    /// Send path (§2): seal, frame, mask, enqueue for the transport to drain.
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::Crypto(crypto::Error::AuthenticationFailed));
        }
        if self.send_nonce_counter == u64::MAX {
            self.closed = true;
            return Err(Error::NonceExhausted);
        }
        self.send_nonce_counter += 1;

        let sealed = crypto::seal(
            self.cipher,
            &self.key[..self.cipher.key_len()],
            self.send_nonce_counter,
            plaintext,
        )?;
        let framed = frame::seal_frame(&sealed);
        let masked = self.codec.mask(&framed);

        self.outbound.push_back(masked);
        Ok(())
    }

    /// Drains every masked frame queued since the last drain.
    pub fn drain_outbound(&mut self) -> Vec<Vec<u8>> {
        self.outbound.drain(..).collect()
    }

    pub fn outbound_is_empty(&self) -> bool {
        self.outbound.is_empty()
    }

    /// Receive path (§2): unmask, reassemble frames, open each in order.
    /// Returns the plaintexts recovered from any frames that completed.
    ///
    /// A frame whose AEAD tag fails to verify closes the session (§7:
    /// CryptoFailure) rather than skipping the bad frame, since the frame
    /// stream has no resync point past a corrupted record.
    pub fn feed_masked(&mut self, masked: &[u8]) -> Result<Vec<Vec<u8>>> {
        if self.closed {
            return Err(Error::Crypto(crypto::Error::AuthenticationFailed));
        }

        let unmasked = self.codec.unmask(masked);
        self.frame_parser.push(&unmasked);

        let mut plaintexts = Vec::new();
        for frame_body in self.frame_parser.take_frames() {
            if self.recv_nonce_counter == u64::MAX {
                self.closed = true;
                return Err(Error::NonceExhausted);
            }
            self.recv_nonce_counter += 1;

            match crypto::open(
                self.cipher,
                &self.key[..self.cipher.key_len()],
                self.recv_nonce_counter,
                &frame_body,
            ) {
                Ok(plaintext) => plaintexts.push(plaintext),
                Err(e) => {
                    self.closed = true;
                    return Err(Error::Crypto(e));
                }
            }
        }

        Ok(plaintexts)
    }

    /// §4.5's `close()`: drains queues, marks closed. Waking a pending
    /// long-poll waiter is the poll session manager's responsibility (C7)
    /// since the waiter handle lives in the registry entry, not here.
    pub fn close(&mut self) {
        self.outbound.clear();
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(cipher: CipherKind) -> (Session, Session) {
        let key = [9u8; 32];
        (
            Session::create(key, cipher, Layout::Ascii),
            Session::create(key, cipher, Layout::Ascii),
        )
    }

    #[test]
    fn seal_and_feed_roundtrip_one_message() {
        let (mut sender, mut receiver) = pair(CipherKind::ChaCha20Poly1305);

        sender.seal(b"hello over the wire").unwrap();
        let masked = sender.drain_outbound();
        assert_eq!(masked.len(), 1);

        let plaintexts = receiver.feed_masked(&masked[0]).unwrap();
        assert_eq!(plaintexts, vec![b"hello over the wire".to_vec()]);
    }

    #[test]
    fn multiple_frames_survive_being_fed_as_one_concatenated_chunk() {
        let (mut sender, mut receiver) = pair(CipherKind::ChaCha20Poly1305);

        sender.seal(&[0x00]).unwrap();
        sender.seal(&[0xFFu8; 1024]).unwrap();
        sender.seal(&[0x55u8; 4096]).unwrap();

        let masked = sender.drain_outbound();
        let mut concatenated = Vec::new();
        for m in &masked {
            concatenated.extend_from_slice(m);
        }

        let plaintexts = receiver.feed_masked(&concatenated).unwrap();
        assert_eq!(plaintexts[0], vec![0x00]);
        assert_eq!(plaintexts[1], vec![0xFFu8; 1024]);
        assert_eq!(plaintexts[2], vec![0x55u8; 4096]);
    }

    #[test]
    fn nonce_counters_increase_strictly_and_match_sender_and_receiver() {
        let (mut sender, mut receiver) = pair(CipherKind::ChaCha20Poly1305);

        for i in 0..4u8 {
            sender.seal(&[i]).unwrap();
        }
        assert_eq!(sender.send_nonce_counter, 4);

        let masked = sender.drain_outbound();
        for m in masked {
            receiver.feed_masked(&m).unwrap();
        }
        assert_eq!(receiver.recv_nonce_counter, 4);
    }

    #[test]
    fn tampered_frame_closes_the_session() {
        let (mut sender, mut receiver) = pair(CipherKind::ChaCha20Poly1305);

        sender.seal(b"attack at dawn").unwrap();
        let mut masked = sender.drain_outbound().remove(0);
        *masked.last_mut().unwrap() ^= 0x01;

        let err = receiver.feed_masked(&masked);
        assert!(err.is_err());
        assert!(receiver.closed());
    }

    #[test]
    fn none_cipher_still_frames_and_masks() {
        let (mut sender, mut receiver) = pair(CipherKind::None);

        sender.seal(b"plaintext passthrough").unwrap();
        let masked = sender.drain_outbound();

        let plaintexts = receiver.feed_masked(&masked[0]).unwrap();
        assert_eq!(plaintexts, vec![b"plaintext passthrough".to_vec()]);
    }

    #[test]
    fn closing_a_session_drops_queued_outbound_frames() {
        let (mut sender, _receiver) = pair(CipherKind::ChaCha20Poly1305);
        sender.seal(b"queued").unwrap();
        sender.close();
        assert!(sender.outbound_is_empty());
        assert!(sender.closed());
    }
}
