//! WebSocket endpoint: connection state machine, send and receive paths
//!
//! One [`Endpoint`] instance is one client-side connection. It moves through
//! `Closed -> Open -> Closing -> Closed`; any transport failure or protocol
//! violation drops it back to `Closed` with the error surface populated.

use crate::config::ClientConfig;
use crate::sink::MessageSink;
use bytes::{Bytes, BytesMut};
use std::net::{IpAddr, SocketAddr};
use tidesock_core::error::{FrameError, ProtocolError};
use tidesock_core::frame::{self, Frame};
use tidesock_core::handshake;
use tidesock_core::protocol::constants::{
    IN_BUFFER_SIZE, MAX_CONTROL_PAYLOAD, MAX_FRAME_HEADER_SIZE, MAX_HEADER_SIZE, OUT_BUFFER_SIZE,
};
use tidesock_core::transport::TransportStream;
use tidesock_core::url::WsUrl;
use tidesock_core::{CloseCode, Error, Opcode, Result};
use tidesock_transport_tcp::TcpStream;

/// Upper bound on the stored last-error message.
const MAX_ERROR_LEN: usize = 256;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live connection
    Closed,
    /// Handshake complete, frames may flow
    Open,
    /// Close frame sent, awaiting the peer's close
    Closing,
}

/// A client-side WebSocket connection.
///
/// Not thread-safe: all calls must come from one thread at a time.
pub struct Endpoint {
    config: ClientConfig,
    stream: Option<Box<dyn TransportStream>>,
    state: ConnectionState,

    error: bool,
    error_msg: String,

    /// Outbound frame staging buffer.
    out_buf: BytesMut,
    /// Inbound byte staging for the frame decoder.
    net_buf: BytesMut,

    /// Fixed reassembly buffer; the fast path for messages up to its size.
    in_buf: Box<[u8]>,
    in_len: usize,
    /// One-shot heap buffer for messages that outgrow `in_buf`; released on
    /// delivery.
    overflow: Option<Vec<u8>>,
    /// Opcode of the fragmented message in progress, if any.
    message_opcode: Option<Opcode>,

    ping_backlog: u32,
    pings_received: u32,

    on_message: Option<MessageSink>,
    on_pong: Option<MessageSink>,
}

impl Endpoint {
    /// Create a disconnected endpoint with default configuration.
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a disconnected endpoint with the given configuration.
    pub fn with_config(config: ClientConfig) -> Self {
        let ping_backlog = config.ping_backlog.max(1);
        Self {
            config,
            stream: None,
            state: ConnectionState::Closed,
            error: false,
            error_msg: String::new(),
            out_buf: BytesMut::with_capacity(OUT_BUFFER_SIZE),
            net_buf: BytesMut::new(),
            in_buf: vec![0u8; IN_BUFFER_SIZE].into_boxed_slice(),
            in_len: 0,
            overflow: None,
            message_opcode: None,
            ping_backlog,
            pings_received: 0,
            on_message: None,
            on_pong: None,
        }
    }

    // ------------------------------------------------------------------
    // Connection management
    // ------------------------------------------------------------------

    /// Connect to `url` (`ws://host[:port]` or `wss://host[:port]`) and
    /// perform the opening handshake for `path`.
    ///
    /// On success the endpoint is `Open` and any previous error state is
    /// cleared. On failure the transport is released, the error surface is
    /// populated and the endpoint stays `Closed`.
    #[cfg_attr(feature = "logging", tracing::instrument(skip(self)))]
    pub fn connect(&mut self, url: &str, path: &str) -> Result<()> {
        self.do_connect(url, path, None)
    }

    /// As [`connect`](Endpoint::connect), but bind the socket to a local
    /// address (and optionally a device name) before connecting.
    #[cfg_attr(feature = "logging", tracing::instrument(skip(self)))]
    pub fn connect_via_interface(
        &mut self,
        url: &str,
        path: &str,
        local_addr: IpAddr,
        device: Option<&str>,
    ) -> Result<()> {
        self.do_connect(url, path, Some((local_addr, device)))
    }

    fn do_connect(
        &mut self,
        url: &str,
        path: &str,
        bind: Option<(IpAddr, Option<&str>)>,
    ) -> Result<()> {
        // A connect always starts from a clean slate; a previous connection
        // (and a previous error) does not survive it.
        self.teardown();
        self.error = false;
        self.error_msg.clear();
        self.config.validate()?;

        match self.establish(url, path, bind) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = ConnectionState::Open;
                self.ping_backlog = self.config.ping_backlog.max(1);
                self.pings_received = 0;
                #[cfg(feature = "logging")]
                tracing::debug!(url, path, "connection open");
                Ok(())
            }
            Err(err) => {
                self.record_error(&err);
                Err(err)
            }
        }
    }

    fn establish(
        &mut self,
        url: &str,
        path: &str,
        bind: Option<(IpAddr, Option<&str>)>,
    ) -> Result<Box<dyn TransportStream>> {
        let parsed = WsUrl::parse(url)?;

        let tcp = match bind {
            Some((local, device)) => {
                TcpStream::connect_via_interface(&parsed.host, parsed.port, local, device)?
            }
            None => TcpStream::connect(&parsed.host, parsed.port)?,
        };

        let mut stream: Box<dyn TransportStream> = if parsed.scheme.is_secure() {
            self.wrap_tls(tcp, &parsed)?
        } else {
            Box::new(tcp)
        };

        let path = if path.is_empty() { "/" } else { path };
        let key = handshake::generate_key();
        let request =
            handshake::build_upgrade_request(path, &parsed.host, parsed.port, parsed.scheme, &key);

        stream.write_all(request.as_bytes())?;
        stream.flush()?;

        // Drain the response head. Bytes past the blank line already belong
        // to the frame stream and are kept.
        let mut response = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            let n = stream.read(&mut chunk)?;
            if n == 0 {
                return Err(Error::Connection(
                    "connection closed during handshake".to_string(),
                ));
            }
            response.extend_from_slice(&chunk[..n]);
            if response.len() > MAX_HEADER_SIZE {
                return Err(tidesock_core::error::HandshakeError::ResponseTooLarge.into());
            }
            if let Some(end) = handshake::find_header_end(&response) {
                break end;
            }
        };

        let head = String::from_utf8_lossy(&response[..header_end]);
        let upgrade = handshake::parse_upgrade_response(&head)?;
        handshake::validate_upgrade_response(&upgrade, &key)?;

        self.net_buf.clear();
        self.net_buf.extend_from_slice(&response[header_end..]);
        self.reset_reassembly();

        if self.config.nonblocking {
            stream.set_nonblocking(true)?;
        }

        Ok(stream)
    }

    #[cfg(feature = "tls")]
    fn wrap_tls(&self, tcp: TcpStream, url: &WsUrl) -> Result<Box<dyn TransportStream>> {
        use std::sync::Arc;
        use tidesock_transport_tls::TlsStream;

        let config = TlsStream::client_config(self.config.ca_file.as_deref())?;
        let server_name = self
            .config
            .server_name
            .clone()
            .unwrap_or_else(|| url.host.clone());

        Ok(Box::new(TlsStream::connect(
            tcp.into_std()?,
            &server_name,
            Arc::new(config),
        )?))
    }

    #[cfg(not(feature = "tls"))]
    fn wrap_tls(&self, _tcp: TcpStream, _url: &WsUrl) -> Result<Box<dyn TransportStream>> {
        Err(Error::Connection(
            "wss URLs require the `tls` feature".to_string(),
        ))
    }

    /// Initiate the closing handshake.
    ///
    /// Sends a close frame with `code` (and an optional UTF-8 reason) and
    /// moves to `Closing`. In blocking mode this then drains incoming frames
    /// until the peer's close arrives and the transport is released; in
    /// non-blocking mode subsequent [`read_message`](Endpoint::read_message)
    /// calls complete the handshake.
    #[cfg_attr(feature = "logging", tracing::instrument(skip(self)))]
    pub fn close(&mut self, code: CloseCode, reason: Option<&str>) -> Result<()> {
        match self.state {
            ConnectionState::Closed => return Err(Error::NotConnected),
            ConnectionState::Closing => return Ok(()),
            ConnectionState::Open => {}
        }

        self.write_frame(Frame::close(Some(code.code()), reason).mask(true))?;
        self.state = ConnectionState::Closing;

        if !self.config.nonblocking {
            loop {
                match self.next_frame() {
                    Ok(Some(frame)) if frame.opcode == Opcode::Close => break,
                    // Data still in flight when we initiated the close is
                    // discarded, as is a would-block blip from a transport
                    // switched non-blocking out from under us.
                    Ok(_) => continue,
                    // A peer that drops the socket instead of answering the
                    // close still ends the handshake.
                    Err(_) => break,
                }
            }
            self.teardown();
        }

        Ok(())
    }

    /// True while the connection is open.
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Remote address of the live connection.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        match &self.stream {
            Some(stream) => stream.peer_addr(),
            None => Err(Error::NotConnected),
        }
    }

    // ------------------------------------------------------------------
    // Error surface
    // ------------------------------------------------------------------

    /// True when an error has been recorded since the last connect/clear.
    pub fn status(&self) -> bool {
        self.error
    }

    /// Human-readable description of the last error, empty when none.
    pub fn error_message(&self) -> &str {
        &self.error_msg
    }

    /// Clear the error flag. Only permitted while the connection is open;
    /// once closed, only a new successful connect resets the surface.
    pub fn clear_error(&mut self) {
        if self.state == ConnectionState::Open {
            self.error = false;
            self.error_msg.clear();
        }
    }

    fn record_error(&mut self, err: &Error) {
        self.error = true;
        let mut msg = err.to_string();
        if msg.len() > MAX_ERROR_LEN {
            let mut cut = MAX_ERROR_LEN;
            while !msg.is_char_boundary(cut) {
                cut -= 1;
            }
            msg.truncate(cut);
        }
        self.error_msg = msg;
    }

    fn fail_fast(&mut self) -> Error {
        let err = Error::NotConnected;
        self.record_error(&err);
        err
    }

    // ------------------------------------------------------------------
    // Sinks and control-frame knobs
    // ------------------------------------------------------------------

    /// Install the sink that receives completed messages.
    pub fn set_on_message(&mut self, sink: MessageSink) {
        self.on_message = Some(sink);
    }

    /// Install the sink that receives pong payloads.
    pub fn set_on_pong(&mut self, sink: MessageSink) {
        self.on_pong = Some(sink);
    }

    /// Answer every `backlog`-th received ping with an automatic pong.
    /// 1 answers every ping; 0 is clamped to 1.
    pub fn set_ping_backlog(&mut self, backlog: u32) {
        self.ping_backlog = backlog.max(1);
    }

    /// Send a ping frame with up to 125 bytes of payload.
    pub fn ping(&mut self, payload: &[u8]) -> Result<()> {
        if self.state != ConnectionState::Open {
            return Err(self.fail_fast());
        }
        if payload.len() > MAX_CONTROL_PAYLOAD {
            return Err(FrameError::ControlPayloadTooLarge { len: payload.len() }.into());
        }
        self.write_frame(Frame::ping(Bytes::copy_from_slice(payload)).mask(true))
    }

    /// Send a pong frame manually. Resets the received-ping counter, so an
    /// application managing its own ping/pong cadence observes no drift.
    pub fn pong(&mut self, payload: &[u8]) -> Result<()> {
        if self.state != ConnectionState::Open {
            return Err(self.fail_fast());
        }
        if payload.len() > MAX_CONTROL_PAYLOAD {
            return Err(FrameError::ControlPayloadTooLarge { len: payload.len() }.into());
        }
        self.write_frame(Frame::pong(Bytes::copy_from_slice(payload)).mask(true))?;
        self.pings_received = 0;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Send path
    // ------------------------------------------------------------------

    /// Send a text message of arbitrary length.
    pub fn send(&mut self, payload: &str) -> Result<()> {
        self.send_data(Opcode::Text, payload.as_bytes())
    }

    /// Send a binary message of arbitrary length.
    pub fn send_binary(&mut self, payload: &[u8]) -> Result<()> {
        self.send_data(Opcode::Binary, payload)
    }

    fn send_data(&mut self, opcode: Opcode, payload: &[u8]) -> Result<()> {
        if self.state != ConnectionState::Open {
            return Err(self.fail_fast());
        }

        let max_chunk = OUT_BUFFER_SIZE - MAX_FRAME_HEADER_SIZE;

        if payload.len() <= max_chunk {
            return self.write_frame(Frame::new(opcode, Bytes::copy_from_slice(payload)).mask(true));
        }

        // Fragment: first frame carries the data opcode, the rest are
        // continuations, only the last one has FIN set. Every frame gets its
        // own masking key.
        let chunks = (payload.len() + max_chunk - 1) / max_chunk;
        for (i, chunk) in payload.chunks(max_chunk).enumerate() {
            let op = if i == 0 { opcode } else { Opcode::Continuation };
            let fin = i == chunks - 1;
            self.write_frame(Frame::new(op, Bytes::copy_from_slice(chunk)).fin(fin).mask(true))?;
        }

        Ok(())
    }

    /// Encode `frame` into the staging buffer and write it out, verifying
    /// the transport accepted every byte. A short or failed write means the
    /// connection is gone: the endpoint tears down to `Closed`.
    fn write_frame(&mut self, frame: Frame) -> Result<()> {
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return Err(Error::NotConnected),
        };

        self.out_buf.clear();
        frame.write_to(&mut self.out_buf);

        let result = stream.write(&self.out_buf);
        match result {
            Ok(n) if n == self.out_buf.len() => Ok(()),
            Ok(n) => {
                let err = Error::Connection(format!(
                    "connection dropped during send: wrote {n} of {} bytes",
                    self.out_buf.len()
                ));
                self.record_error(&err);
                self.teardown();
                Err(err)
            }
            Err(err) => {
                self.record_error(&err);
                self.teardown();
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Receive path
    // ------------------------------------------------------------------

    /// Drive one read cycle.
    ///
    /// Pulls frames until one logical message has been delivered to the
    /// message sink, or returns after handling a standalone control frame.
    /// In non-blocking mode a would-block read returns immediately with no
    /// error and no state change; partially buffered frames are picked up by
    /// the next call.
    pub fn read_message(&mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Err(self.fail_fast());
        }

        loop {
            let frame = match self.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(()),
                Err(err) => return Err(self.fail_connection(err)),
            };

            match frame.opcode {
                Opcode::Ping => {
                    self.on_ping(&frame)?;
                    if self.message_opcode.is_none() {
                        return Ok(());
                    }
                }
                Opcode::Pong => {
                    if let Some(sink) = self.on_pong.as_mut() {
                        let _ = sink(&frame.payload[..], frame.payload.len());
                    }
                    if self.message_opcode.is_none() {
                        return Ok(());
                    }
                }
                Opcode::Close => {
                    self.on_peer_close(&frame);
                    return Ok(());
                }
                Opcode::Text | Opcode::Binary => {
                    if self.message_opcode.is_some() {
                        let err = ProtocolError::ExpectedContinuation(frame.opcode).into();
                        return Err(self.fail_connection(err));
                    }
                    self.accumulate(&frame.payload);
                    if frame.fin {
                        self.deliver();
                        return Ok(());
                    }
                    self.message_opcode = Some(frame.opcode);
                }
                Opcode::Continuation => {
                    if self.message_opcode.is_none() {
                        let err = ProtocolError::UnexpectedContinuation.into();
                        return Err(self.fail_connection(err));
                    }
                    self.accumulate(&frame.payload);
                    if frame.fin {
                        self.deliver();
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Pull one frame from the wire, or `None` when a non-blocking read has
    /// nothing ready yet.
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if !self.net_buf.is_empty() {
                match Frame::parse(&mut self.net_buf) {
                    Ok(frame) => {
                        if frame.masked {
                            return Err(ProtocolError::MaskedServerFrame.into());
                        }
                        return Ok(Some(frame));
                    }
                    Err(err) if frame::is_incomplete(&err) => {}
                    Err(err) => return Err(err),
                }
            }

            let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
            let mut chunk = [0u8; 8192];
            match stream.read(&mut chunk) {
                Ok(0) => {
                    return Err(Error::Connection("connection closed by peer".to_string()));
                }
                Ok(n) => self.net_buf.extend_from_slice(&chunk[..n]),
                // Buffered partial frames stay in net_buf for the next call.
                Err(err) if err.is_would_block() => return Ok(None),
                Err(err) => return Err(err),
            }
        }
    }

    fn on_ping(&mut self, frame: &Frame) -> Result<()> {
        self.pings_received += 1;
        if self.pings_received >= self.ping_backlog {
            self.write_frame(Frame::pong(frame.payload.clone()).mask(true))?;
            self.pings_received = 0;
        }
        Ok(())
    }

    /// Handle a close frame from the peer: echo it if we had not started
    /// closing ourselves, then release the transport. A partially assembled
    /// message is discarded, never delivered.
    fn on_peer_close(&mut self, frame: &Frame) {
        #[cfg(feature = "logging")]
        tracing::debug!(code = ?frame.close_code(), "close frame received");

        if self.state == ConnectionState::Open {
            if let Some(stream) = self.stream.as_mut() {
                let echo = Frame::close(frame.close_code(), None).mask(true);
                let _ = stream.write(&echo.to_bytes());
            }
        }

        self.teardown();
    }

    /// Record `err`, attempt a best-effort CLOSE(1002) for protocol
    /// violations, and drop to `Closed`.
    fn fail_connection(&mut self, err: Error) -> Error {
        self.record_error(&err);

        if matches!(err, Error::Frame(_) | Error::Protocol(_)) {
            if let Some(stream) = self.stream.as_mut() {
                let close =
                    Frame::close(Some(CloseCode::ProtocolError.code()), None).mask(true);
                let _ = stream.write(&close.to_bytes());
            }
        }

        #[cfg(feature = "logging")]
        tracing::debug!(error = %err, "connection failed");

        self.teardown();
        err
    }

    fn accumulate(&mut self, payload: &[u8]) {
        if let Some(buf) = self.overflow.as_mut() {
            buf.extend_from_slice(payload);
        } else if self.in_len + payload.len() <= self.in_buf.len() {
            self.in_buf[self.in_len..self.in_len + payload.len()].copy_from_slice(payload);
            self.in_len += payload.len();
        } else {
            // One-shot growth: move what the fixed buffer holds into a heap
            // buffer sized for the message so far plus this frame.
            let mut grown = Vec::with_capacity(self.in_len + payload.len());
            grown.extend_from_slice(&self.in_buf[..self.in_len]);
            grown.extend_from_slice(payload);
            self.overflow = Some(grown);
        }
    }

    /// Hand the completed message to the sink with the true payload length
    /// and the capacity of whichever buffer it lives in, then reset.
    fn deliver(&mut self) {
        if let Some(sink) = self.on_message.as_mut() {
            match self.overflow.as_ref() {
                Some(buf) => {
                    let _ = sink(buf.as_slice(), buf.capacity());
                }
                None => {
                    let _ = sink(&self.in_buf[..self.in_len], self.in_buf.len());
                }
            }
        }
        self.reset_reassembly();
    }

    fn reset_reassembly(&mut self) {
        self.in_len = 0;
        self.overflow = None;
        self.message_opcode = None;
    }

    /// Release the transport and return to `Closed`. Reassembly state and
    /// buffered wire bytes do not survive the connection.
    fn teardown(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close();
        }
        self.state = ConnectionState::Closed;
        self.net_buf.clear();
        self.reset_reassembly();
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("state", &self.state)
            .field("error", &self.error)
            .field("ping_backlog", &self.ping_backlog)
            .field("peer_addr", &self.peer_addr().ok())
            .finish()
    }
}
