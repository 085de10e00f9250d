//! The initiator's fresh random challenge.

use crate::codec::{read_raw, write_raw};
use crate::error::HandshakeError;
use rand::RngCore;
use std::io::{Read, Write};

/// Size in bytes of the handshake challenge (§4.2, `CHALLENGE_SIZE`).
pub const CHALLENGE_SIZE: usize = 256;

/// A fresh 256-byte random blob generated by the initiator and signed by the
/// responder to prove possession of its private key. Lives only across the
/// handshake.
pub struct Challenge(pub [u8; CHALLENGE_SIZE]);

impl Challenge {
    /// Draws a fresh challenge from a cryptographically secure RNG.
    pub fn generate<R: RngCore>(rng: &mut R) -> Self {
        let mut bytes = [0u8; CHALLENGE_SIZE];
        rng.fill_bytes(&mut bytes);
        Challenge(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CHALLENGE_SIZE] {
        &self.0
    }

    /// Writes the challenge as 256 raw bytes, with no length prefix.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<(), HandshakeError> {
        write_raw(w, &self.0)
    }

    /// Reads 256 raw challenge bytes, with no length prefix.
    pub fn read<R: Read>(r: &mut R) -> Result<Self, HandshakeError> {
        Ok(Challenge(read_raw::<_, CHALLENGE_SIZE>(r)?))
    }
}
