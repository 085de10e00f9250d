//! A mutually authenticated, RSA/AES encrypted duplex tunnel over any
//! bidirectional byte stream.
//!
//! Two peers, each holding a long-lived RSA key pair, run a challenge-response
//! handshake ([`initiate`]/[`respond`]) to authenticate each other and agree
//! on a symmetric session key, then exchange application bytes through a
//! [`Tunnel`] that transparently encrypts writes and decrypts reads with
//! AES-256 in ECB mode.
//!
//! This crate provides no transport, no key storage, and no MAC over
//! ciphertext — data integrity beyond what the underlying stream guarantees
//! is the caller's responsibility. See the module docs on [`cipher`] for why
//! ECB was kept rather than replaced.

mod challenge;
mod cipher;
mod codec;
mod error;
mod handshake;
mod keys;
mod session_key;
mod tunnel;

pub use challenge::{Challenge, CHALLENGE_SIZE};
pub use cipher::BLOCK_SIZE;
pub use codec::{read_string, write_string};
pub use error::{HandshakeError, HandshakeOutcome};
pub use handshake::{initiate, respond};
pub use keys::{LocalKey, RemotePublicKey};
pub use session_key::SessionKey;
pub use tunnel::{Tunnel, TunnelReader, TunnelWriter};
