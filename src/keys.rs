//! Long-lived RSA identity key pairs and public-key wire encoding.
//!
//! The source protocol serializes public keys as an opaque CSP blob; that
//! format has no portable equivalent outside the ecosystem this crate was
//! distilled from. This rewrite instead emits DER-encoded
//! `SubjectPublicKeyInfo` (PKCS#8), the conventional encoding used across the
//! Rust RSA ecosystem — see DESIGN.md for the tradeoff.

use crate::error::HandshakeError;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

/// This peer's long-lived key pair.
///
/// Used by the initiator to decrypt the incoming session-key envelope and by
/// the responder to sign the initiator's challenge; both roles publish the
/// public half so the other side can authenticate them.
#[derive(Clone)]
pub struct LocalKey {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl LocalKey {
    /// Wraps an existing RSA private key as this peer's long-lived identity.
    pub fn new(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        LocalKey { private, public }
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }

    /// Returns this peer's public identity as a [`RemotePublicKey`], i.e.
    /// the representation that is sent on the wire and matched against an
    /// acceptable set by the peer.
    pub fn to_public_key(&self) -> RemotePublicKey {
        RemotePublicKey(self.public.clone())
    }
}

/// The public half of a peer's identity key.
///
/// Constructed either by the caller (as a member of an "acceptable set" to
/// authenticate against) or by parsing the key the remote peer sent over the
/// wire during the handshake. The instance retained on a successfully
/// established [`crate::Tunnel`] is always the latter — the one
/// cryptographically matched during the handshake, never the one merely
/// proposed by the caller.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RemotePublicKey(pub(crate) RsaPublicKey);

impl RemotePublicKey {
    pub fn from_rsa(key: RsaPublicKey) -> Self {
        RemotePublicKey(key)
    }

    pub fn as_rsa(&self) -> &RsaPublicKey {
        &self.0
    }

    /// Encodes this key as the DER `SubjectPublicKeyInfo` blob sent on the
    /// wire.
    pub fn to_der_bytes(&self) -> Result<Vec<u8>, HandshakeError> {
        self.0
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| HandshakeError::InvalidPublicKey(e.to_string()))
    }

    /// Decodes a DER `SubjectPublicKeyInfo` blob as received from a peer.
    pub fn from_der_bytes(bytes: &[u8]) -> Result<Self, HandshakeError> {
        RsaPublicKey::from_public_key_der(bytes)
            .map(RemotePublicKey)
            .map_err(|e| HandshakeError::InvalidPublicKey(e.to_string()))
    }

    /// True if `self` and `other` are the same RSA key, compared by modulus
    /// (the exponent is conventionally fixed and carries no identity).
    pub fn matches(&self, other: &RemotePublicKey) -> bool {
        self.0.n() == other.0.n()
    }

    /// True if `self`'s modulus byte-equals that of some member of
    /// `acceptable_set` — the identity-acceptance rule used identically by
    /// both handshake roles (§4.2.1 step 5 / §4.2.2 step 2).
    pub fn is_in(&self, acceptable_set: &[RemotePublicKey]) -> bool {
        acceptable_set.iter().any(|k| self.matches(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn fresh_key() -> LocalKey {
        LocalKey::new(RsaPrivateKey::new(&mut OsRng, 2048).unwrap())
    }

    #[test]
    fn public_key_round_trips_through_der() {
        let key = fresh_key();
        let pub_key = key.to_public_key();
        let der = pub_key.to_der_bytes().unwrap();
        let decoded = RemotePublicKey::from_der_bytes(&der).unwrap();
        assert!(pub_key.matches(&decoded));
    }

    #[test]
    fn distinct_keys_do_not_match() {
        let a = fresh_key().to_public_key();
        let b = fresh_key().to_public_key();
        assert!(!a.matches(&b));
    }

    #[test]
    fn acceptable_set_membership() {
        let a = fresh_key().to_public_key();
        let b = fresh_key().to_public_key();
        let c = fresh_key().to_public_key();
        let set = vec![b.clone(), c.clone()];
        assert!(!a.is_in(&set));
        assert!(b.is_in(&set));
    }
}
