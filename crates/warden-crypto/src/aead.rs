//! Authenticated symmetric encryption for the secrets store.
//!
//! Uses ChaCha20-Poly1305 (RFC 8439). The master key never leaves this
//! module in plaintext form longer than a single call needs it; callers
//! hold an [`AeadKey`], which zeroizes its bytes on drop.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, CryptoResult};

/// Nonce length for `ChaCha20Poly1305`, in bytes.
pub const NONCE_LEN: usize = 12;

/// A 256-bit AEAD key, zeroized on drop.
///
/// Holds no information about where the key material came from (OS
/// keychain, file, freshly generated) — that policy lives in the crate
/// that owns master-key acquisition.
#[derive(ZeroizeOnDrop)]
pub struct AeadKey([u8; 32]);

impl AeadKey {
    /// Wrap raw key bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Try to wrap a byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if `slice` is not 32 bytes.
    pub fn try_from_slice(slice: &[u8]) -> CryptoResult<Self> {
        if slice.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Generate a new random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Raw key bytes, for writing to the master-key file or OS keychain.
    ///
    /// Callers that copy these bytes into another buffer are responsible
    /// for zeroizing that buffer themselves.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }

    /// Encrypt `plaintext`, returning `nonce || ciphertext` with the
    /// Poly1305 tag appended by the underlying AEAD implementation.
    ///
    /// A fresh random nonce is drawn for every call; the key is never
    /// reused with a nonce the caller supplies.
    #[must_use]
    pub fn seal(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        // ChaCha20Poly1305 only fails to encrypt on absurd plaintext sizes
        // (> ~256 GiB), which never happens for a secrets blob.
        let mut ciphertext = self
            .cipher()
            .encrypt(nonce, plaintext)
            .expect("chacha20poly1305 encryption of a bounded secrets blob cannot fail");

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.append(&mut ciphertext);
        ciphertext.zeroize();
        out
    }

    /// Decrypt a blob produced by [`seal`](Self::seal).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidNonceLength`] if `blob` is shorter
    /// than the nonce, or [`CryptoError::AeadFailure`] if the tag does not
    /// verify (wrong key, or the ciphertext was tampered with).
    pub fn open(&self, blob: &[u8]) -> CryptoResult<Vec<u8>> {
        if blob.len() < NONCE_LEN {
            return Err(CryptoError::InvalidNonceLength {
                expected: NONCE_LEN,
                actual: blob.len(),
            });
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher()
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::AeadFailure)
    }
}

impl std::fmt::Debug for AeadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadKey").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = AeadKey::generate();
        let plaintext = b"api-key-for-the-weather-plugin";

        let sealed = key.seal(plaintext);
        let opened = key.open(&sealed).unwrap();

        assert_eq!(opened, plaintext);
    }

    #[test]
    fn distinct_calls_use_distinct_nonces() {
        let key = AeadKey::generate();
        let a = key.seal(b"same plaintext");
        let b = key.seal(b"same plaintext");

        assert_ne!(a, b, "nonce reuse would make ciphertexts identical");
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let key = AeadKey::generate();
        let other = AeadKey::generate();
        let sealed = key.seal(b"top secret");

        assert!(matches!(other.open(&sealed), Err(CryptoError::AeadFailure)));
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let key = AeadKey::generate();
        let mut sealed = key.seal(b"top secret");
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;

        assert!(matches!(key.open(&sealed), Err(CryptoError::AeadFailure)));
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let key = AeadKey::generate();
        assert!(matches!(
            key.open(&[0u8; 4]),
            Err(CryptoError::InvalidNonceLength { .. })
        ));
    }

    #[test]
    fn invalid_key_length_is_rejected() {
        assert!(matches!(
            AeadKey::try_from_slice(&[0u8; 16]),
            Err(CryptoError::InvalidKeyLength { .. })
        ));
    }
}
