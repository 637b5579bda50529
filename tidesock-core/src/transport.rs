//! Transport layer abstraction
//!
//! A uniform byte-stream capability over plain TCP and TLS. The endpoint
//! holds a `Box<dyn TransportStream>` and dispatches uniformly; transport
//! crates provide the two concrete variants.

use crate::error::Result;
use std::net::SocketAddr;

/// Trait for transport streams.
///
/// Reads and writes are blocking unless the stream has been switched to
/// non-blocking mode, in which case a read with no data ready fails with an
/// [`std::io::ErrorKind::WouldBlock`] I/O error — distinct from `Ok(0)`,
/// which always means EOF. Implementations wrap each read and write in a
/// [`SigpipeGuard`](crate::sigpipe::SigpipeGuard) critical section.
pub trait TransportStream: Send {
    /// Read data from the stream; `Ok(0)` is EOF.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write data to the stream, returning how many bytes were accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Write all data to the stream.
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Flush the stream.
    fn flush(&mut self) -> Result<()>;

    /// Shut down and release the underlying socket.
    fn close(&mut self) -> Result<()>;

    /// Switch the stream between blocking and non-blocking reads.
    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<()>;

    /// Get the remote address.
    fn peer_addr(&self) -> Result<SocketAddr>;

    /// Get the local address.
    fn local_addr(&self) -> Result<SocketAddr>;
}

impl std::fmt::Debug for dyn TransportStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportStream")
            .field("peer_addr", &self.peer_addr().ok())
            .finish()
    }
}
