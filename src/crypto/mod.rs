//! C1–C3: ChaCha20 keystream, Poly1305 authenticator, and the AEAD engine
//! built from them (plus the AES-128-GCM host-primitive alternative).

pub mod aead;
pub mod chacha20;
pub mod poly1305;

pub use aead::Error;

/// §6's `cipher` configuration option.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CipherKind {
    /// Bypasses the AEAD engine entirely — frames carry plaintext.
    None,
    Aes128Gcm,
    ChaCha20Poly1305,
}

impl CipherKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "aes-128-gcm" => Some(Self::Aes128Gcm),
            "chacha20-poly1305" => Some(Self::ChaCha20Poly1305),
            _ => None,
        }
    }

    pub fn key_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::Aes128Gcm => 16,
            Self::ChaCha20Poly1305 => 32,
        }
    }
}

impl std::fmt::Display for CipherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Aes128Gcm => "aes-128-gcm",
            Self::ChaCha20Poly1305 => "chacha20-poly1305",
        };
        write!(f, "{s}")
    }
}

/// Seals `plaintext` under `cipher`'s nonce discipline (§4.3).
///
/// - ChaCha20-Poly1305: nonce is `key[0..4] ‖ be64(counter)`, `counter` is
///   the session's send-nonce counter (already incremented by the caller
///   before this is invoked — see `session::Session::seal`).
/// - AES-128-GCM: nonce is drawn fresh per call since GCM has no safe
///   counter convention shared with the peer in this wire format.
pub fn seal(cipher: CipherKind, key: &[u8], counter: u64, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    match cipher {
        CipherKind::None => Ok(plaintext.to_vec()),
        CipherKind::ChaCha20Poly1305 => {
            let key: &[u8; 32] = key.try_into().map_err(|_| Error::InvalidKeyMaterial)?;
            let mut nonce = [0u8; 12];
            nonce[0..4].copy_from_slice(&key[0..4]);
            nonce[4..12].copy_from_slice(&counter.to_be_bytes());
            Ok(aead::chacha20_poly1305_seal(key, &nonce, b"", plaintext))
        }
        CipherKind::Aes128Gcm => {
            let key: &[u8; 16] = key.try_into().map_err(|_| Error::InvalidKeyMaterial)?;
            let mut nonce = [0u8; 12];
            rand::RngCore::fill_bytes(&mut rand::rng(), &mut nonce);
            aead::aes128_gcm_seal(key, &nonce, b"", plaintext)
        }
    }
}

/// Opens a sealed record. `counter` is the nonce counter the sender used
/// to produce this record (ChaCha20-Poly1305 only — AES-GCM's nonce rides
/// along in the record itself).
pub fn open(cipher: CipherKind, key: &[u8], counter: u64, sealed: &[u8]) -> Result<Vec<u8>, Error> {
    match cipher {
        CipherKind::None => Ok(sealed.to_vec()),
        CipherKind::ChaCha20Poly1305 => {
            let key: &[u8; 32] = key.try_into().map_err(|_| Error::InvalidKeyMaterial)?;
            let mut nonce = [0u8; 12];
            nonce[0..4].copy_from_slice(&key[0..4]);
            nonce[4..12].copy_from_slice(&counter.to_be_bytes());
            aead::chacha20_poly1305_open(key, &nonce, b"", sealed)
        }
        CipherKind::Aes128Gcm => {
            let key: &[u8; 16] = key.try_into().map_err(|_| Error::InvalidKeyMaterial)?;
            aead::aes128_gcm_open(key, b"", sealed)
        }
    }
}
