use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;

use crate::error::{Result, TransportError};
use crate::fdpass;

/// A byte stream that can also carry descriptor arrays out of band.
///
/// Buffers go through the ordinary `Read`/`Write` path; descriptors travel as
/// `SCM_RIGHTS` control messages. The two never interleave within a single
/// call, so a sender must write its buffer before its descriptors and the
/// receiver must read them in the same order.
pub trait DescriptorChannel: Read + Write {
    /// Send `fds` to the peer. The caller keeps ownership of its handles.
    fn send_descriptors(&mut self, fds: &[BorrowedFd<'_>]) -> Result<()>;

    /// Receive exactly `count` descriptors from the peer.
    fn recv_descriptors(&mut self, count: usize) -> Result<Vec<OwnedFd>>;

    /// Write the whole buffer (blocking).
    fn send_buf(&mut self, buf: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < buf.len() {
            match self.write(&buf[offset..]) {
                Ok(0) => return Err(TransportError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        loop {
            match self.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// Fill the whole buffer (blocking).
    ///
    /// Returns `Err(TransportError::ConnectionClosed)` on a short read.
    fn recv_buf(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < buf.len() {
            match self.read(&mut buf[offset..]) {
                Ok(0) => return Err(TransportError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(())
    }
}

/// A connected IPC stream over a Unix domain socket.
pub struct IpcStream {
    inner: UnixStream,
}

impl Read for IpcStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for IpcStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl DescriptorChannel for IpcStream {
    fn send_descriptors(&mut self, fds: &[BorrowedFd<'_>]) -> Result<()> {
        fdpass::send_descriptors(self.inner.as_fd(), fds)
    }

    fn recv_descriptors(&mut self, count: usize) -> Result<Vec<OwnedFd>> {
        fdpass::recv_descriptors(self.inner.as_fd(), count)
    }
}

impl DescriptorChannel for UnixStream {
    fn send_descriptors(&mut self, fds: &[BorrowedFd<'_>]) -> Result<()> {
        fdpass::send_descriptors(self.as_fd(), fds)
    }

    fn recv_descriptors(&mut self, count: usize) -> Result<Vec<OwnedFd>> {
        fdpass::recv_descriptors(self.as_fd(), count)
    }
}

impl IpcStream {
    /// Create a connected pair of streams (`socketpair(2)`).
    pub fn pair() -> Result<(Self, Self)> {
        let (a, b) = UnixStream::pair()?;
        Ok((Self::from(a), Self::from(b)))
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }
}

impl From<UnixStream> for IpcStream {
    fn from(stream: UnixStream) -> Self {
        Self { inner: stream }
    }
}

impl AsFd for IpcStream {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.as_fd()
    }
}

impl AsRawFd for IpcStream {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

impl std::fmt::Debug for IpcStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcStream")
            .field("type", &"unix")
            .field("fd", &self.inner.as_raw_fd())
            .finish()
    }
}
