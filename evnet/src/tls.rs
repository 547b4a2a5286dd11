//! Hook points for a TLS implementation.
//!
//! The engine does not implement TLS. A [`TlsSession`] installed with
//! [`Connection::start_tls`](crate::Connection::start_tls) sits between the
//! socket and the connection buffers: the engine drives
//! [`handshake`](TlsSession::handshake) until it completes, then moves all
//! application data through [`recv`](TlsSession::recv) and
//! [`send`](TlsSession::send).
//!
//! All calls are non-blocking. `Ok(0)` means no progress could be made
//! right now, `Err(_)` is fatal for the connection and `Ok(n)` is progress.

use std::io;

use shared::error::Result;

/// Raw, non-blocking transport under a TLS session.
pub trait RawIo {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// A TLS session bound to one connection.
pub trait TlsSession {
    /// Advances the handshake. Returns `Ok(true)` once it is complete.
    fn handshake(&mut self, io: &mut dyn RawIo) -> Result<bool>;

    /// Decrypts application data into `buf`.
    fn recv(&mut self, io: &mut dyn RawIo, buf: &mut [u8]) -> Result<usize>;

    /// Encrypts and writes application data from `buf`, returning how many
    /// plaintext bytes were consumed.
    fn send(&mut self, io: &mut dyn RawIo, buf: &[u8]) -> Result<usize>;

    /// Plaintext already decrypted and buffered inside the session.
    fn pending(&self) -> usize {
        0
    }

    /// Called once when the connection is torn down.
    fn free(&mut self) {}
}
