//! TLS transport implementation for Tidesock
//!
//! Wraps an already-connected TCP stream in a synchronous rustls client
//! session. SNI is always configured from the caller-supplied server name;
//! servers hosting several names behind one address need it to present the
//! right certificate.

use rustls::{ClientConfig, ClientConnection, OwnedTrustAnchor, RootCertStore, StreamOwned};
use std::io::{BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use tidesock_core::sigpipe::SigpipeGuard;
use tidesock_core::transport::TransportStream;
use tidesock_core::{Error, Result};

/// TLS stream implementation
pub struct TlsStream {
    stream: Option<StreamOwned<ClientConnection, std::net::TcpStream>>,
    peer_addr: SocketAddr,
}

impl std::fmt::Debug for TlsStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsStream")
            .field("peer_addr", &self.peer_addr)
            .field("connected", &self.stream.is_some())
            .finish()
    }
}

impl TlsStream {
    /// Create a client config trusting the webpki root set, optionally
    /// extended with additional PEM certificates from `extra_ca`.
    pub fn client_config(extra_ca: Option<&Path>) -> Result<ClientConfig> {
        let mut root_store = RootCertStore::empty();
        root_store.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
            OwnedTrustAnchor::from_subject_spki_name_constraints(
                ta.subject,
                ta.spki,
                ta.name_constraints,
            )
        }));

        if let Some(path) = extra_ca {
            let file = std::fs::File::open(path).map_err(Error::Io)?;
            let mut reader = BufReader::new(file);
            for der in rustls_pemfile::certs(&mut reader).map_err(Error::Io)? {
                root_store
                    .add(&rustls::Certificate(der))
                    .map_err(|e| Error::Connection(format!("invalid CA certificate: {e}")))?;
            }
        }

        let config = ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Ok(config)
    }

    /// Wrap a connected TCP stream in TLS, completing the TLS handshake.
    ///
    /// `server_name` is used both for SNI and certificate validation.
    pub fn connect(
        tcp: std::net::TcpStream,
        server_name: &str,
        config: Arc<ClientConfig>,
    ) -> Result<Self> {
        let peer_addr = tcp
            .peer_addr()
            .unwrap_or_else(|_| "0.0.0.0:0".parse().unwrap());

        let name = rustls::ServerName::try_from(server_name)
            .map_err(|e| Error::Connection(format!("invalid server name {server_name}: {e}")))?;

        let conn = ClientConnection::new(config, name)
            .map_err(|e| Error::Connection(format!("TLS setup failed: {e}")))?;

        let mut stream = StreamOwned::new(conn, tcp);

        // Drive the TLS handshake to completion now so certificate problems
        // surface at connect time, not on the first frame.
        while stream.conn.is_handshaking() {
            let _guard = SigpipeGuard::new();
            stream
                .conn
                .complete_io(&mut stream.sock)
                .map_err(|e| Error::Connection(format!("TLS handshake failed: {e}")))?;
        }

        Ok(Self {
            stream: Some(stream),
            peer_addr,
        })
    }

    fn inner(&mut self) -> Result<&mut StreamOwned<ClientConnection, std::net::TcpStream>> {
        self.stream.as_mut().ok_or(Error::NotConnected)
    }
}

impl TransportStream for TlsStream {
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
        if let Some(mut stream) = self.stream.take() {
            stream.conn.send_close_notify();
            let _guard = SigpipeGuard::new();
            let _ = stream.conn.complete_io(&mut stream.sock);
            stream.sock.shutdown(Shutdown::Both).ok();
        }
        Ok(())
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<()> {
        self.inner()?
            .sock
            .set_nonblocking(nonblocking)
            .map_err(Error::Io)
    }

    fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.peer_addr)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        match &self.stream {
            Some(stream) => stream.sock.local_addr().map_err(Error::Io),
            None => Err(Error::NotConnected),
        }
    }
}
