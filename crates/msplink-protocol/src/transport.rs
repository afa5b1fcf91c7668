//! Byte transport underneath a session.
//!
//! The session never reads an open-ended amount: it always knows how many
//! bytes the next frame (or frame part) occupies and asks for exactly that.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use crate::error::TransportError;

/// A blocking byte link to the device.
pub trait Transport {
    /// Write every byte of `data`.
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Read exactly `len` bytes, failing with [`TransportError::Timeout`] if
    /// they do not all arrive within `timeout`.
    fn read_exact(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write_all(data)
    }

    fn read_exact(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        (**self).read_exact(len, timeout)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write_all(data)
    }

    fn read_exact(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        (**self).read_exact(len, timeout)
    }
}

/// [`Transport`] over any blocking `Read + Write` stream.
///
/// The stream should have a short read timeout of its own (for a
/// `TcpStream`, `set_read_timeout`). Each timed-out read is retried until the
/// per-call deadline passes, so the stream timeout only sets the polling
/// granularity.
#[derive(Debug)]
pub struct StreamTransport<S> {
    stream: S,
}

impl<S: Read + Write> StreamTransport<S> {
    /// Wrap a stream.
    pub fn new(stream: S) -> Self {
        StreamTransport { stream }
    }

    /// Borrow the stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Mutably borrow the stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Unwrap the stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: Read + Write> Transport for StreamTransport<S> {
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(data)?;
        self.stream.flush()?;
        Ok(())
    }

    fn read_exact(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut buf = vec![0u8; len];
        let mut filled = 0;

        while filled < len {
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => filled += n,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(TransportError::Io(e)),
            }

            if filled < len && Instant::now() >= deadline {
                return Err(TransportError::Timeout {
                    expected: len,
                    received: filled,
                });
            }
        }

        Ok(buf)
    }
}
