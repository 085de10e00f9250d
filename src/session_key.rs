//! The symmetric session key (and IV) generated by the responder, transported
//! to the initiator RSA-OAEP-encrypted exactly once, and zeroized when the
//! tunnel closes.

use crate::codec::{read_blob, write_blob};
use crate::error::HandshakeError;
use crate::keys::LocalKey;
use rand::RngCore;
use rsa::{Oaep, RsaPublicKey};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use std::io::{Read, Write};
use zeroize::Zeroize;

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;
/// IV size in bytes, transported alongside the key (§4.2) even though the
/// fixed ECB mode does not itself consume any chaining state — kept for wire
/// parity with the source format and for a future CBC/CTR migration (§9).
pub const IV_SIZE: usize = 16;

#[derive(Clone, Zeroize)]
struct KeyMaterial {
    key: [u8; KEY_SIZE],
    iv: [u8; IV_SIZE],
}

/// The symmetric key and IV installed after a successful handshake. Held
/// behind [`secrecy::Secret`] so it is zeroized the moment the tunnel (and
/// this value) is dropped; destruction on tunnel close falls out of ordinary
/// Rust `Drop`.
pub struct SessionKey(Secret<KeyMaterial>);

impl SessionKey {
    /// Generates a fresh 256-bit key and 16-byte IV from a cryptographically
    /// secure RNG. Performed once by the responder per tunnel (§4.2.2 step
    /// 3); never reused across tunnels (§9).
    pub fn generate<R: RngCore>(rng: &mut R) -> Self {
        let mut key = [0u8; KEY_SIZE];
        let mut iv = [0u8; IV_SIZE];
        rng.fill_bytes(&mut key);
        rng.fill_bytes(&mut iv);
        SessionKey(Secret::new(KeyMaterial { key, iv }))
    }

    pub fn key(&self) -> &[u8; KEY_SIZE] {
        &self.0.expose_secret().key
    }

    pub fn iv(&self) -> &[u8; IV_SIZE] {
        &self.0.expose_secret().iv
    }

    /// Encrypts `<length-prefixed key><length-prefixed iv>` under the
    /// remote's public key with OAEP, and writes the resulting ciphertext
    /// length-prefixed (§4.2.2 step 4, §6 wire message 3).
    pub fn write_envelope<W: Write, R: RngCore>(
        &self,
        w: &mut W,
        remote_public_key: &RsaPublicKey,
        rng: &mut R,
    ) -> Result<(), HandshakeError> {
        let mut plaintext = Vec::with_capacity(KEY_SIZE + IV_SIZE + 4);
        let material = self.0.expose_secret();
        write_blob(&mut plaintext, &material.key)?;
        write_blob(&mut plaintext, &material.iv)?;

        let ciphertext = remote_public_key
            .encrypt(rng, Oaep::new::<Sha256>(), &plaintext)
            .map_err(|e| HandshakeError::Rsa(e.to_string()))?;
        plaintext.zeroize();

        write_blob(w, &ciphertext)
    }

    /// Reads a length-prefixed RSA-OAEP envelope, decrypts it with the
    /// local private key, and parses the inner `<key><iv>` pair (§4.2.1
    /// step 3, §6 wire message 3).
    pub fn read_envelope<R: Read>(r: &mut R, local: &LocalKey) -> Result<Self, HandshakeError> {
        let ciphertext = read_blob(r)?;
        let mut plaintext = local
            .private_key()
            .decrypt(Oaep::new::<Sha256>(), &ciphertext)
            .map_err(|e| HandshakeError::EnvelopeDecryptionFailed(e.to_string()))?;

        let mut cursor = &plaintext[..];
        let key_bytes = read_blob(&mut cursor)?;
        let iv_bytes = read_blob(&mut cursor)?;

        let key: [u8; KEY_SIZE] = key_bytes
            .try_into()
            .map_err(|_| HandshakeError::MalformedEnvelope)?;
        let iv: [u8; IV_SIZE] = iv_bytes
            .try_into()
            .map_err(|_| HandshakeError::MalformedEnvelope)?;

        plaintext.zeroize();
        Ok(SessionKey(Secret::new(KeyMaterial { key, iv })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use rsa::RsaPrivateKey;

    #[test]
    fn envelope_round_trips() {
        let priv_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let local = LocalKey::new(priv_key);
        let pub_key = RsaPublicKey::from(local.private_key());

        let session = SessionKey::generate(&mut OsRng);
        let mut wire = Vec::new();
        session
            .write_envelope(&mut wire, &pub_key, &mut OsRng)
            .unwrap();

        let mut cursor = &wire[..];
        let decoded = SessionKey::read_envelope(&mut cursor, &local).unwrap();
        assert_eq!(decoded.key(), session.key());
        assert_eq!(decoded.iv(), session.iv());
    }

    #[test]
    fn two_generated_keys_differ() {
        let a = SessionKey::generate(&mut OsRng);
        let b = SessionKey::generate(&mut OsRng);
        assert_ne!(a.key(), b.key());
        assert_ne!(a.iv(), b.iv());
    }

    #[test]
    fn envelope_cannot_be_decrypted_by_the_wrong_private_key() {
        let priv_a = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let priv_b = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let pub_a = RsaPublicKey::from(&priv_a);
        let local_b = LocalKey::new(priv_b);

        let session = SessionKey::generate(&mut OsRng);
        let mut wire = Vec::new();
        session.write_envelope(&mut wire, &pub_a, &mut OsRng).unwrap();

        let mut cursor = &wire[..];
        assert!(SessionKey::read_envelope(&mut cursor, &local_b).is_err());
    }
}
