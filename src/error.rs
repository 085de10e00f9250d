use std::io;

/// Everything that can go wrong while driving the handshake or the
/// post-handshake cipher pipeline.
///
/// This is distinct from [`HandshakeOutcome`]: identity rejection is an
/// expected branch of the protocol and is reported as a value, not as an
/// error. Anything in this enum is a hard failure — the partially
/// constructed tunnel is torn down and the error is returned to the caller.
#[derive(thiserror::Error, Debug)]
pub enum HandshakeError {
    #[error("I/O error during handshake: {0}")]
    Io(#[from] io::Error),

    #[error("stream ended before a complete length-prefixed blob was read")]
    ShortRead,

    #[error("length prefix is malformed or exceeds the maximum encodable width")]
    MalformedLength,

    #[error("public key blob could not be decoded: {0}")]
    InvalidPublicKey(String),

    #[error("session-key envelope could not be decrypted: {0}")]
    EnvelopeDecryptionFailed(String),

    #[error("session-key envelope has an unexpected inner layout")]
    MalformedEnvelope,

    #[error("RSA operation failed: {0}")]
    Rsa(String),
}

impl From<HandshakeError> for io::Error {
    fn from(e: HandshakeError) -> io::Error {
        match e {
            HandshakeError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}

/// Result of a completed handshake attempt.
///
/// Identity-rejection is a normal-flow outcome, not an exception, so it is
/// carried here rather than as an `Err`. Only
/// [`HandshakeOutcome::Established`] carries a usable [`crate::Tunnel`].
#[derive(Debug)]
pub enum HandshakeOutcome<T> {
    /// Handshake completed and mutual authentication succeeded.
    Established(T),
    /// The peer's public key was not a member of the caller-supplied
    /// acceptable set.
    RemoteDoesNotHaveValidPublicKey,
    /// The peer's challenge signature failed to verify (initiator only).
    RemoteFailedToVerifyItself,
}

impl<T> HandshakeOutcome<T> {
    /// Returns the established tunnel, or `None` if the handshake was
    /// rejected for identity reasons.
    pub fn established(self) -> Option<T> {
        match self {
            HandshakeOutcome::Established(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_established(&self) -> bool {
        matches!(self, HandshakeOutcome::Established(_))
    }
}
