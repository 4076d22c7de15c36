//! At-rest encryption for Credential secrets. Uses AES-256-GCM with a key
//! the embedding application supplies; the Knowledge Store never generates
//! or persists a key of its own.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};

const NONCE_LEN: usize = 12;

/// Encrypts `plaintext` under `key`, returning `nonce || ciphertext`.
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Vec<u8> {
    let cipher = Aes256Gcm::new_from_slice(key).expect("key length is 32");
    let nonce = Aes256Gcm::generate_nonce(OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .expect("in-memory AES-GCM encryption does not fail");
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&ciphertext);
    out
}

/// Decrypts a blob produced by [`encrypt`]. Returns `None` on a malformed or
/// wrong-key blob rather than panicking — callers treat this as "secret unreadable".
pub fn decrypt(key: &[u8; 32], blob: &[u8]) -> Option<Vec<u8>> {
    if blob.len() < NONCE_LEN {
        return None;
    }
    let cipher = Aes256Gcm::new_from_slice(key).ok()?;
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher.decrypt(nonce, ciphertext).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let key = [7u8; 32];
        let blob = encrypt(&key, b"hunter2");
        assert_eq!(decrypt(&key, &blob).unwrap(), b"hunter2");
    }

    #[test]
    fn wrong_key_fails_closed() {
        let blob = encrypt(&[1u8; 32], b"hunter2");
        assert!(decrypt(&[2u8; 32], &blob).is_none());
    }
}
