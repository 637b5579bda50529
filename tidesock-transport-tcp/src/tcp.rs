//! TCP transport implementation for Tidesock
//!
//! A thin wrapper over `std::net::TcpStream` satisfying the
//! [`TransportStream`] capability. Every read and write runs inside a
//! [`SigpipeGuard`] critical section.

use socket2::{Domain, Protocol as SockProtocol, Socket, Type};
use std::io::{Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, ToSocketAddrs};
use tidesock_core::sigpipe::SigpipeGuard;
use tidesock_core::transport::TransportStream;
use tidesock_core::{Error, Result};

/// TCP stream implementation
#[derive(Debug)]
pub struct TcpStream {
    stream: Option<std::net::TcpStream>,
    peer_addr: SocketAddr,
}

impl TcpStream {
    /// Create a new TCP stream from an already-connected std stream
    pub fn from_std(stream: std::net::TcpStream) -> Self {
        let peer_addr = stream
            .peer_addr()
            .unwrap_or_else(|_| "0.0.0.0:0".parse().unwrap());

        Self {
            stream: Some(stream),
            peer_addr,
        }
    }

    /// Resolve `host` and connect to it on `port`.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = std::net::TcpStream::connect((host, port)).map_err(Error::Io)?;
        stream.set_nodelay(true).ok();
        Ok(Self::from_std(stream))
    }

    /// Connect while bound to a specific local interface.
    ///
    /// The socket is bound to `local_addr` (and, on Linux, to `device` via
    /// `SO_BINDTODEVICE`) before the connect so the kernel routes the
    /// connection out of that interface.
    pub fn connect_via_interface(
        host: &str,
        port: u16,
        local_addr: IpAddr,
        device: Option<&str>,
    ) -> Result<Self> {
        let remote = resolve(host, port, local_addr.is_ipv4())?;

        let domain = if remote.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket =
            Socket::new(domain, Type::STREAM, Some(SockProtocol::TCP)).map_err(Error::Io)?;

        #[cfg(any(target_os = "linux", target_os = "android"))]
        if let Some(device) = device {
            socket
                .bind_device(Some(device.as_bytes()))
                .map_err(Error::Io)?;
        }
        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        if device.is_some() {
            return Err(Error::Connection(
                "device binding is not supported on this platform".to_string(),
            ));
        }

        socket
            .bind(&SocketAddr::new(local_addr, 0).into())
            .map_err(Error::Io)?;
        socket.connect(&remote.into()).map_err(Error::Io)?;

        let stream: std::net::TcpStream = socket.into();
        stream.set_nodelay(true).ok();
        Ok(Self::from_std(stream))
    }

    /// Consume the wrapper, returning the underlying std stream.
    pub fn into_std(mut self) -> Result<std::net::TcpStream> {
        self.stream.take().ok_or(Error::NotConnected)
    }

    fn inner(&mut self) -> Result<&mut std::net::TcpStream> {
        self.stream.as_mut().ok_or(Error::NotConnected)
    }
}

/// Resolve `host:port`, preferring the address family of the local bind.
fn resolve(host: &str, port: u16, want_v4: bool) -> Result<SocketAddr> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs().map_err(Error::Io)?.collect();

    addrs
        .iter()
        .find(|a| a.is_ipv4() == want_v4)
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| Error::Connection(format!("could not resolve {host}:{port}")))
}

impl TransportStream for TcpStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stream = self.inner()?;
        let _guard = SigpipeGuard::new();
        stream.read(buf).map_err(Error::Io)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let stream = self.inner()?;
        let _guard = SigpipeGuard::new();
        stream.write(buf).map_err(Error::Io)
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let stream = self.inner()?;
        let _guard = SigpipeGuard::new();
        stream.write_all(buf).map_err(Error::Io)
    }

    fn flush(&mut self) -> Result<()> {
        let stream = self.inner()?;
        let _guard = SigpipeGuard::new();
        stream.flush().map_err(Error::Io)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            stream.shutdown(Shutdown::Both).ok();
        }
        Ok(())
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<()> {
        self.inner()?.set_nonblocking(nonblocking).map_err(Error::Io)
    }

    fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.peer_addr)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        match &self.stream {
            Some(stream) => stream.local_addr().map_err(Error::Io),
            None => Err(Error::NotConnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_connect_and_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            conn.read_exact(&mut buf).unwrap();
            conn.write_all(&buf).unwrap();
        });

        let mut stream = TcpStream::connect("127.0.0.1", port).unwrap();
        stream.write_all(b"hello").unwrap();

        let mut buf = [0u8; 5];
        let mut filled = 0;
        while filled < buf.len() {
            filled += TransportStream::read(&mut stream, &mut buf[filled..]).unwrap();
        }
        assert_eq!(&buf, b"hello");

        stream.close().unwrap();
        assert!(stream.local_addr().is_err());
        server.join().unwrap();
    }

    #[test]
    fn test_nonblocking_read_would_block() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut stream = TcpStream::connect("127.0.0.1", port).unwrap();
        stream.set_nonblocking(true).unwrap();

        let mut buf = [0u8; 16];
        let err = TransportStream::read(&mut stream, &mut buf).unwrap_err();
        assert!(err.is_would_block());

        drop(listener);
    }

    #[test]
    fn test_closed_stream_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut stream = TcpStream::connect("127.0.0.1", port).unwrap();
        stream.close().unwrap();

        let mut buf = [0u8; 4];
        assert!(matches!(
            TransportStream::read(&mut stream, &mut buf),
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            stream.write(b"x"),
            Err(Error::NotConnected)
        ));
    }
}
