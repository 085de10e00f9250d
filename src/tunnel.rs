//! The authenticated tunnel façade: a duplex byte stream backed by the
//! installed session cipher, block-boundary flush helpers, and teardown
//! (§4.4/§5).

use crate::cipher::{Decryptor, Encryptor, BLOCK_SIZE};
use crate::keys::RemotePublicKey;
use crate::session_key::SessionKey;
use std::io::{self, Read, Write};
use std::sync::Arc;

/// A mutually authenticated, encrypted duplex channel over one underlying
/// stream. Only ever produced by [`crate::initiate`] or [`crate::respond`]
/// on a successful [`crate::HandshakeOutcome::Established`].
///
/// `Tunnel` is `Send` but not `Sync`: one thread may read while another
/// writes (the two directions share no mutable state), but concurrent calls
/// into the same half from multiple threads are not synchronized. Use
/// [`Tunnel::into_split`] to hand the two halves to separate threads.
pub struct Tunnel<R, W> {
    decryptor: Decryptor<R>,
    encryptor: Encryptor<W>,
    remote_public_key: RemotePublicKey,
    // Kept solely so the session key's zeroize-on-drop fires no earlier than
    // the tunnel itself goes away; the cipher transforms already carry their
    // own expanded key schedule and never read this again.
    _session_key: Arc<SessionKey>,
    bytes_read: u64,
    bytes_written: u64,
    leave_open: bool,
}

impl<R: Read, W: Write> Tunnel<R, W> {
    pub(crate) fn new(
        reader: R,
        writer: W,
        session_key: SessionKey,
        remote_public_key: RemotePublicKey,
        leave_open: bool,
    ) -> Self {
        let key = *session_key.key();
        let session_key = Arc::new(session_key);
        Tunnel {
            decryptor: Decryptor::new(reader, &key),
            encryptor: Encryptor::new(writer, &key),
            remote_public_key,
            _session_key: session_key,
            bytes_read: 0,
            bytes_written: 0,
            leave_open,
        }
    }

    /// The block size of the installed cipher, in bytes (16 for AES).
    pub fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    /// The peer's identity, as cryptographically matched during the
    /// handshake — never merely the key the caller proposed.
    pub fn remote_public_key(&self) -> &RemotePublicKey {
        &self.remote_public_key
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Pads the write side up to the next block boundary with zero bytes and
    /// flushes, so the encryptor emits a full trailing ciphertext block.
    /// Call this after every application-level message boundary; the
    /// receiver, knowing the message length in advance, discards the pad.
    pub fn flush_writer(&mut self) -> io::Result<()> {
        let pad = BLOCK_SIZE - (self.bytes_written as usize % BLOCK_SIZE);
        if pad != BLOCK_SIZE {
            let zeros = vec![0u8; pad];
            self.write_all(&zeros)?;
        }
        self.flush()
    }

    /// Mirror of [`Tunnel::flush_writer`] on the read side: reads and
    /// discards up to the next block boundary (read-and-discard, not
    /// write-and-discard — a source ecosystem implementation is known to
    /// get this backwards).
    pub fn flush_reader(&mut self) -> io::Result<()> {
        let pad = BLOCK_SIZE - (self.bytes_read as usize % BLOCK_SIZE);
        if pad != BLOCK_SIZE {
            let mut discard = vec![0u8; pad];
            self.read_exact(&mut discard)?;
        }
        Ok(())
    }

    /// Disposes the session key, closes the cipher transforms, and returns
    /// the underlying stream halves if `leave_open` was requested at
    /// handshake time; otherwise the halves are dropped along with `self`.
    pub fn close(self) -> Option<(R, W)> {
        if self.leave_open {
            Some((self.decryptor.into_inner(), self.encryptor.into_inner()))
        } else {
            None
        }
    }

    /// Splits the tunnel into independent read and write halves that can be
    /// moved to separate threads (§5). Each half owns its own cipher
    /// transform and byte counter; neither shares mutable state with the
    /// other beyond the session key's shared teardown.
    pub fn into_split(self) -> (TunnelReader<R>, TunnelWriter<W>) {
        let reader_half = TunnelReader {
            decryptor: self.decryptor,
            remote_public_key: self.remote_public_key.clone(),
            bytes_read: self.bytes_read,
            _session_key: Arc::clone(&self._session_key),
        };
        let writer_half = TunnelWriter {
            encryptor: self.encryptor,
            bytes_written: self.bytes_written,
            leave_open: self.leave_open,
            _session_key: self._session_key,
        };
        (reader_half, writer_half)
    }
}

impl<R: Read, W: Write> Read for Tunnel<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.decryptor.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

impl<R: Read, W: Write> Write for Tunnel<R, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.encryptor.write(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }

    /// Flushes the underlying stream only; no block-boundary padding is
    /// applied. Use [`Tunnel::flush_writer`] to force a padded trailing
    /// block out before an application-level message boundary.
    fn flush(&mut self) -> io::Result<()> {
        self.encryptor.flush()
    }
}

/// The read half produced by [`Tunnel::into_split`].
pub struct TunnelReader<R> {
    decryptor: Decryptor<R>,
    remote_public_key: RemotePublicKey,
    bytes_read: u64,
    _session_key: Arc<SessionKey>,
}

impl<R: Read> TunnelReader<R> {
    pub fn remote_public_key(&self) -> &RemotePublicKey {
        &self.remote_public_key
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn flush_reader(&mut self) -> io::Result<()> {
        let pad = BLOCK_SIZE - (self.bytes_read as usize % BLOCK_SIZE);
        if pad != BLOCK_SIZE {
            let mut discard = vec![0u8; pad];
            self.read_exact(&mut discard)?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.decryptor.into_inner()
    }
}

impl<R: Read> Read for TunnelReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.decryptor.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

/// The write half produced by [`Tunnel::into_split`].
pub struct TunnelWriter<W> {
    encryptor: Encryptor<W>,
    bytes_written: u64,
    leave_open: bool,
    _session_key: Arc<SessionKey>,
}

impl<W: Write> TunnelWriter<W> {
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn flush_writer(&mut self) -> io::Result<()> {
        let pad = BLOCK_SIZE - (self.bytes_written as usize % BLOCK_SIZE);
        if pad != BLOCK_SIZE {
            let zeros = vec![0u8; pad];
            self.write_all(&zeros)?;
        }
        self.flush()
    }

    pub fn close(self) -> Option<W> {
        if self.leave_open {
            Some(self.encryptor.into_inner())
        } else {
            None
        }
    }
}

impl<W: Write> Write for TunnelWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.encryptor.write(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encryptor.flush()
    }
}
