//! The post-handshake session cipher: AES-256 in ECB mode with no padding,
//! wrapped around the read and write halves of the underlying stream.
//!
//! ECB is ordinarily unsafe for structured plaintext, but it is a fixed,
//! deliberate choice of the wire protocol this crate implements: the session
//! cipher is treated purely as a byte-stream transform at block granularity,
//! with no chaining state between blocks.
//! Each 16-byte block is encrypted or decrypted independently, which is
//! exactly what "ECB" means, so these types simply call the underlying
//! block cipher once per 16 bytes — no separate ECB-mode crate is needed.

use aes::Aes256;
use cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use std::io::{self, Read, Write};

/// AES block size in bytes. Exposed read-only on [`crate::Tunnel`] as
/// `block_size` (§4.3).
pub const BLOCK_SIZE: usize = 16;

/// Encrypts plaintext written to it in 16-byte blocks and forwards the
/// ciphertext immediately to the wrapped writer. Bytes that do not fill a
/// complete block are buffered until either enough bytes arrive or the
/// caller explicitly pads to a block boundary (`Tunnel::flush_writer`).
pub struct Encryptor<W> {
    inner: W,
    cipher: Aes256,
    pending: Vec<u8>,
}

impl<W: Write> Encryptor<W> {
    pub fn new(inner: W, key: &[u8; 32]) -> Self {
        Encryptor {
            inner,
            cipher: Aes256::new(GenericArray::from_slice(key)),
            pending: Vec::with_capacity(BLOCK_SIZE),
        }
    }

    /// True once an unflushed partial block is sitting in the buffer.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Consumes the encryptor, discarding any cipher state, and returns the
    /// wrapped writer. Used by `Tunnel::close` to hand the stream back to
    /// the caller when `leave_open` was requested.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn encrypt_and_emit_full_blocks(&mut self) -> io::Result<()> {
        while self.pending.len() >= BLOCK_SIZE {
            let mut block = GenericArray::clone_from_slice(&self.pending[..BLOCK_SIZE]);
            self.cipher.encrypt_block(&mut block);
            self.inner.write_all(&block)?;
            self.pending.drain(..BLOCK_SIZE);
        }
        Ok(())
    }
}

impl<W: Write> Write for Encryptor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.encrypt_and_emit_full_blocks()?;
        Ok(buf.len())
    }

    /// Flushes the underlying stream only. No cipher state (a pending
    /// partial block) is committed by a plain flush — see
    /// `Tunnel::flush_writer` for block-aligned padding.
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decrypts ciphertext read from the wrapped reader one 16-byte block at a
/// time and serves plaintext to the caller, buffering any bytes of a
/// decrypted block not yet consumed.
pub struct Decryptor<R> {
    inner: R,
    cipher: Aes256,
    pending_plaintext: Vec<u8>,
}

impl<R: Read> Decryptor<R> {
    pub fn new(inner: R, key: &[u8; 32]) -> Self {
        Decryptor {
            inner,
            cipher: Aes256::new(GenericArray::from_slice(key)),
            pending_plaintext: Vec::with_capacity(BLOCK_SIZE),
        }
    }

    /// Consumes the decryptor, discarding any buffered plaintext, and
    /// returns the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads exactly one ciphertext block, decrypts it, and buffers the
    /// plaintext. Returns `Ok(false)` on a clean EOF (no bytes of the next
    /// block were available at all); returns an error if the stream ends
    /// mid-block.
    fn fill_block(&mut self) -> io::Result<bool> {
        let mut block = [0u8; BLOCK_SIZE];
        let mut filled = 0;
        while filled < BLOCK_SIZE {
            let n = self.inner.read(&mut block[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(false);
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "underlying stream ended mid cipher-block",
                ));
            }
            filled += n;
        }
        let mut block = GenericArray::from(block);
        self.cipher.decrypt_block(&mut block);
        self.pending_plaintext = block.to_vec();
        Ok(true)
    }
}

impl<R: Read> Read for Decryptor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending_plaintext.is_empty() && !self.fill_block()? {
            return Ok(0);
        }
        let n = buf.len().min(self.pending_plaintext.len());
        buf[..n].copy_from_slice(&self.pending_plaintext[..n]);
        self.pending_plaintext.drain(..n);
        Ok(n)
    }
}
