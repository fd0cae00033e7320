//! AEAD engine (§4.3): ChaCha20-Poly1305 (RFC 8439, hand-rolled) and
//! AES-128-GCM (delegated to a host primitive).

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Key as AesKey, Nonce as AesNonce};

use super::chacha20::ChaCha20;
use super::poly1305::{self, Poly1305};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// AEAD tag verification failed, or a host-primitive cipher rejected
    /// its inputs. Output is always zeroed before this is returned.
    AuthenticationFailed,
    /// Key or nonce was the wrong length for the selected cipher.
    InvalidKeyMaterial,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthenticationFailed => write!(f, "AEAD tag verification failed"),
            Self::InvalidKeyMaterial => write!(f, "invalid key or nonce length"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

const TAG_LEN: usize = 16;

fn pad16_len(len: usize) -> usize {
    let rem = len % 16;
    if rem == 0 { 0 } else { 16 - rem }
}

/// Seal with ChaCha20-Poly1305 per RFC 8439 §2.8: derive the one-time
/// Poly1305 key at counter 0, encrypt at counter 1, MAC over
/// `AAD ‖ pad16(AAD) ‖ C ‖ pad16(C) ‖ le64(|AAD|) ‖ le64(|C|)`.
///
/// Output is `ciphertext ‖ tag(16)`.
pub fn chacha20_poly1305_seal(
    key: &[u8; 32],
    nonce: &[u8; 12],
    aad: &[u8],
    plaintext: &[u8],
) -> Vec<u8> {
    let (poly_key, mut cipher) = ChaCha20::derive_poly_key(key, nonce);

    let mut ciphertext = vec![0u8; plaintext.len()];
    cipher.xor(&mut ciphertext, plaintext);

    let mut mac_input =
        Vec::with_capacity(aad.len() + pad16_len(aad.len()) + ciphertext.len() + pad16_len(ciphertext.len()) + 16);
    mac_input.extend_from_slice(aad);
    mac_input.resize(mac_input.len() + pad16_len(aad.len()), 0);
    mac_input.extend_from_slice(&ciphertext);
    mac_input.resize(mac_input.len() + pad16_len(ciphertext.len()), 0);
    mac_input.extend_from_slice(&(aad.len() as u64).to_le_bytes());
    mac_input.extend_from_slice(&(ciphertext.len() as u64).to_le_bytes());

    let tag = Poly1305::mac(&poly_key, &mac_input);

    let mut out = ciphertext;
    out.extend_from_slice(&tag);
    out
}

/// Open a ChaCha20-Poly1305 record. On tag mismatch the plaintext buffer
/// returned is all-zero and `Err(AuthenticationFailed)` is returned —
/// callers must not consult any partially-decrypted bytes (there are none).
pub fn chacha20_poly1305_open(
    key: &[u8; 32],
    nonce: &[u8; 12],
    aad: &[u8],
    sealed: &[u8],
) -> Result<Vec<u8>> {
    if sealed.len() < TAG_LEN {
        return Err(Error::AuthenticationFailed);
    }
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);
    let tag: [u8; 16] = tag.try_into().unwrap();

    let (poly_key, mut cipher) = ChaCha20::derive_poly_key(key, nonce);

    let mut mac_input =
        Vec::with_capacity(aad.len() + pad16_len(aad.len()) + ciphertext.len() + pad16_len(ciphertext.len()) + 16);
    mac_input.extend_from_slice(aad);
    mac_input.resize(mac_input.len() + pad16_len(aad.len()), 0);
    mac_input.extend_from_slice(ciphertext);
    mac_input.resize(mac_input.len() + pad16_len(ciphertext.len()), 0);
    mac_input.extend_from_slice(&(aad.len() as u64).to_le_bytes());
    mac_input.extend_from_slice(&(ciphertext.len() as u64).to_le_bytes());

    let expected = Poly1305::mac(&poly_key, &mac_input);

    if !poly1305::verify(&expected, &tag) {
        return Err(Error::AuthenticationFailed);
    }

    let mut plaintext = vec![0u8; ciphertext.len()];
    cipher.xor(&mut plaintext, ciphertext);
    Ok(plaintext)
}

/// Seal with AES-128-GCM via the host primitive. Per §4.3 the nonce is
/// generated per-frame (GCM has no shared deterministic-counter convention
/// with the peer in this wire format) and is carried inside the frame:
/// output is `nonce(12) ‖ ciphertext ‖ tag(16)`.
pub fn aes128_gcm_seal(key: &[u8; 16], nonce: &[u8; 12], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes128Gcm::new(AesKey::<Aes128Gcm>::from_slice(key));
    let nonce_ga = AesNonce::from_slice(nonce);
    let ciphertext = cipher
        .encrypt(nonce_ga, Payload { msg: plaintext, aad })
        .map_err(|_| Error::AuthenticationFailed)?;

    let mut out = Vec::with_capacity(12 + ciphertext.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Opens an `nonce(12) ‖ ciphertext ‖ tag(16)` AES-128-GCM record.
pub fn aes128_gcm_open(key: &[u8; 16], aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < 12 + TAG_LEN {
        return Err(Error::AuthenticationFailed);
    }
    let (nonce, ciphertext) = sealed.split_at(12);
    let cipher = Aes128Gcm::new(AesKey::<Aes128Gcm>::from_slice(key));
    let nonce_ga = AesNonce::from_slice(nonce);
    cipher
        .decrypt(nonce_ga, Payload { msg: ciphertext, aad })
        .map_err(|_| Error::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 8439 §2.8.2 test vector (spec.md S1).
    #[test]
    fn chacha20_poly1305_matches_rfc8439_test_vector() {
        let key: [u8; 32] = [
            0x80, 0x81, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8a, 0x8b, 0x8c, 0x8d,
            0x8e, 0x8f, 0x90, 0x91, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9a, 0x9b,
            0x9c, 0x9d, 0x9e, 0x9f,
        ];
        let nonce: [u8; 12] = [
            0x07, 0x00, 0x00, 0x00, 0x40, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47,
        ];
        let aad: [u8; 12] = [0x50, 0x51, 0x52, 0x53, 0xc0, 0xc1, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7];
        let plaintext = b"Ladies and Gentlemen of the class of '99: \
If I could offer you only one tip for the future, sunscreen would be it.";

        let sealed = chacha20_poly1305_seal(&key, &nonce, &aad, plaintext);

        assert_eq!(
            &sealed[..16],
            [
                0xd3, 0x1a, 0x8d, 0x34, 0x64, 0x8e, 0x60, 0xdb, 0x7b, 0x86, 0xaf, 0xbc, 0x53,
                0xef, 0x7e, 0xc2
            ]
        );
        let tag = &sealed[sealed.len() - 16..];
        assert_eq!(
            tag,
            [
                0x1a, 0xe1, 0x0b, 0x59, 0x4f, 0x09, 0xe2, 0x6a, 0x7e, 0x90, 0x2e, 0xcb, 0xd0,
                0x60, 0x06, 0x91
            ]
        );

        let opened = chacha20_poly1305_open(&key, &nonce, &aad, &sealed).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn chacha20_poly1305_roundtrip_is_identity() {
        let key = [7u8; 32];
        let nonce = [9u8; 12];
        let plaintext = b"hello, world!\n".to_vec();

        let sealed = chacha20_poly1305_seal(&key, &nonce, b"", &plaintext);
        let opened = chacha20_poly1305_open(&key, &nonce, b"", &sealed).unwrap();

        assert_eq!(opened, plaintext);
    }

    #[test]
    fn chacha20_poly1305_tampered_tag_fails_and_does_not_decrypt() {
        let key = [1u8; 32];
        let nonce = [2u8; 12];
        let plaintext = b"attack at dawn".to_vec();

        let mut sealed = chacha20_poly1305_seal(&key, &nonce, b"", &plaintext);
        *sealed.last_mut().unwrap() ^= 0x01;

        let result = chacha20_poly1305_open(&key, &nonce, b"", &sealed);
        assert_eq!(result, Err(Error::AuthenticationFailed));
    }

    #[test]
    fn chacha20_poly1305_tampered_ciphertext_fails() {
        let key = [3u8; 32];
        let nonce = [4u8; 12];
        let plaintext = b"attack at dawn".to_vec();

        let mut sealed = chacha20_poly1305_seal(&key, &nonce, b"", &plaintext);
        sealed[0] ^= 0x01;

        assert_eq!(
            chacha20_poly1305_open(&key, &nonce, b"", &sealed),
            Err(Error::AuthenticationFailed)
        );
    }

    #[test]
    fn aes128_gcm_roundtrip_is_identity() {
        let key = [5u8; 16];
        let nonce = [6u8; 12];
        let plaintext = b"another message".to_vec();

        let sealed = aes128_gcm_seal(&key, &nonce, b"", &plaintext).unwrap();
        let opened = aes128_gcm_open(&key, b"", &sealed).unwrap();

        assert_eq!(opened, plaintext);
    }

    #[test]
    fn aes128_gcm_tampered_fails() {
        let key = [5u8; 16];
        let nonce = [6u8; 12];
        let plaintext = b"another message".to_vec();

        let mut sealed = aes128_gcm_seal(&key, &nonce, b"", &plaintext).unwrap();
        *sealed.last_mut().unwrap() ^= 0x01;

        assert!(aes128_gcm_open(&key, b"", &sealed).is_err());
    }
}
