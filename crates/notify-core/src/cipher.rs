//! AES-256-GCM authenticated encryption for receiver addresses at rest,
//! and an MD5 digest used as the equality-lookup key for them.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};

use crate::error::{Error, Result};

const NONCE_LEN: usize = 12;

/// A thread-safe AES-256-GCM cipher. Each `encrypt` call draws a fresh
/// random nonce from the OS RNG; the nonce is prepended to the ciphertext
/// and the whole thing hex-encoded for storage in a text column.
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    /// `key` must decode to exactly 32 bytes (AES-256). Shorter keys are
    /// padded with zero bytes; this mirrors common key-derivation
    /// leniency but callers should prefer supplying a full-length key.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.is_empty() || key.len() > 32 {
            return Err(Error::cipher(format!(
                "key must be 1..=32 bytes, got {}",
                key.len()
            )));
        }
        let mut padded = [0u8; 32];
        padded[..key.len()].copy_from_slice(key);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&padded));
        Ok(Self { cipher })
    }

    /// Encrypt `plaintext`, returning a hex string of `nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| Error::cipher(format!("encrypt failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(hex::encode(out))
    }

    /// Decrypt a hex string produced by `encrypt`. Rejects input that
    /// doesn't hex-decode or is shorter than the nonce.
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let raw = hex::decode(encoded).map_err(|e| Error::cipher(format!("invalid hex: {e}")))?;
        if raw.len() < NONCE_LEN {
            return Err(Error::cipher("ciphertext shorter than nonce"));
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| Error::cipher(format!("decrypt failed: {e}")))?;

        String::from_utf8(plaintext).map_err(|e| Error::cipher(format!("non-utf8 plaintext: {e}")))
    }
}

/// Fixed-width MD5 digest of a receiver address, used only for equality
/// lookups — never for anything resembling authentication.
pub fn receiver_hash(plaintext: &str) -> String {
    format!("{:x}", md5::compute(plaintext.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> AesGcmCipher {
        AesGcmCipher::new(b"0123456789abcdef01234567").unwrap()
    }

    #[test]
    fn round_trip_identity() {
        let cipher = test_cipher();
        let plaintext = "0911222333";
        let encrypted = cipher.encrypt(plaintext).unwrap();
        assert_ne!(encrypted, plaintext);
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), plaintext);
    }

    #[test]
    fn distinct_nonces_per_call() {
        let cipher = test_cipher();
        let a = cipher.encrypt("a@b.com").unwrap();
        let b = cipher.encrypt("a@b.com").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let cipher_a = AesGcmCipher::new(b"keyA_0000000000000000000").unwrap();
        let cipher_b = AesGcmCipher::new(b"keyB_1111111111111111111").unwrap();
        let encrypted = cipher_a.encrypt("secret@example.com").unwrap();
        assert!(cipher_b.decrypt(&encrypted).is_err());
    }

    #[test]
    fn short_ciphertext_rejected() {
        let cipher = test_cipher();
        assert!(cipher.decrypt("aabb").is_err());
        assert!(cipher.decrypt("not hex!!").is_err());
    }

    #[test]
    fn receiver_hash_is_deterministic() {
        assert_eq!(receiver_hash("0911222333"), receiver_hash("0911222333"));
        assert_ne!(receiver_hash("0911222333"), receiver_hash("0911222334"));
    }
}
