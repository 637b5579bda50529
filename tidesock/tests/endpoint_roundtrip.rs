//! End-to-end round trips against in-process echo servers.

#![cfg(all(feature = "client", feature = "transport-tcp"))]

use bytes::BytesMut;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use tidesock::frame::Frame;
use tidesock::handshake::compute_accept_key;
use tidesock::prelude::*;

type FrameLog = Arc<Mutex<Vec<(Opcode, bool, usize)>>>;

/// Read the client's upgrade request, answer it, then echo frames until a
/// close arrives. Works over any blocking byte stream, so the TLS test can
/// reuse it. Observed data frames are recorded into `log`.
fn serve_echo<S: Read + Write>(stream: &mut S, log: Option<FrameLog>) {
    // Upgrade request ends at the blank line; anything after it is frames.
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    let body_start = loop {
        let n = stream.read(&mut chunk).expect("read handshake");
        assert_ne!(n, 0, "client hung up during handshake");
        head.extend_from_slice(&chunk[..n]);
        if let Some(pos) = head.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let request = String::from_utf8_lossy(&head[..body_start]).to_string();
    let key = request
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("sec-websocket-key")
                .then(|| value.trim().to_string())
        })
        .expect("missing Sec-WebSocket-Key");

    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\
         \r\n",
        compute_accept_key(&key)
    );
    stream.write_all(response.as_bytes()).expect("write response");

    let mut buf = BytesMut::from(&head[body_start..]);
    let mut message = Vec::new();
    let mut message_opcode = None;

    loop {
        match Frame::parse(&mut buf) {
            Ok(frame) => {
                if let (Some(log), true) = (&log, frame.is_data()) {
                    log.lock()
                        .unwrap()
                        .push((frame.opcode, frame.fin, frame.payload_len()));
                }
                match frame.opcode {
                    Opcode::Text | Opcode::Binary | Opcode::Continuation => {
                        if frame.opcode != Opcode::Continuation {
                            message_opcode = Some(frame.opcode);
                        }
                        message.extend_from_slice(&frame.payload);
                        if frame.fin {
                            let opcode = message_opcode.take().unwrap_or(Opcode::Text);
                            let echo = Frame::new(opcode, std::mem::take(&mut message));
                            stream.write_all(&echo.to_bytes()).expect("write echo");
                        }
                    }
                    Opcode::Ping => {
                        let pong = Frame::pong(frame.payload.clone());
                        stream.write_all(&pong.to_bytes()).expect("write pong");
                    }
                    Opcode::Pong => {}
                    Opcode::Close => {
                        let echo = Frame::close(frame.close_code(), None);
                        let _ = stream.write_all(&echo.to_bytes());
                        return;
                    }
                }
            }
            Err(_) => {
                let n = stream.read(&mut chunk).expect("read frames");
                if n == 0 {
                    return;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
        }
    }
}

fn capture_sink(store: Arc<Mutex<Vec<Vec<u8>>>>) -> MessageSink {
    Box::new(move |payload, _capacity| {
        store.lock().unwrap().push(payload.to_vec());
        true
    })
}

#[test]
fn ws_echo_roundtrip() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut conn, _) = listener.accept().unwrap();
        serve_echo(&mut conn, None);
    });

    let received = Arc::new(Mutex::new(Vec::new()));
    let mut endpoint = Endpoint::new();
    endpoint.set_on_message(capture_sink(Arc::clone(&received)));

    endpoint.connect(&format!("ws://127.0.0.1:{port}"), "/").unwrap();
    assert!(endpoint.is_open());

    endpoint.send("hello").unwrap();
    endpoint.read_message().unwrap();

    {
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0], b"hello");
        assert_eq!(received[0].len(), 5);
    }

    endpoint.close(CloseCode::Normal, None).unwrap();
    assert!(!endpoint.is_open());
    assert!(!endpoint.status(), "clean close must not flag an error");

    server.join().unwrap();
}

#[test]
fn ws_fragmented_send_observed_on_the_wire() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let frame_log: FrameLog = Arc::new(Mutex::new(Vec::new()));
    let server_log = Arc::clone(&frame_log);
    let server = thread::spawn(move || {
        let (mut conn, _) = listener.accept().unwrap();
        serve_echo(&mut conn, Some(server_log));
    });

    let payload = "x".repeat(200 * 1024);
    let received = Arc::new(Mutex::new(Vec::new()));
    let mut endpoint = Endpoint::new();
    endpoint.set_on_message(capture_sink(Arc::clone(&received)));

    endpoint.connect(&format!("ws://127.0.0.1:{port}"), "/").unwrap();
    endpoint.send(&payload).unwrap();
    endpoint.read_message().unwrap();

    // The peer observed one TEXT frame with FIN=0 followed by CONT frames,
    // the last with FIN=1.
    {
        let log = frame_log.lock().unwrap();
        assert!(log.len() > 1);
        assert_eq!(log[0].0, Opcode::Text);
        assert!(!log[0].1);
        for (opcode, fin, _) in &log[1..log.len() - 1] {
            assert_eq!(*opcode, Opcode::Continuation);
            assert!(!fin);
        }
        let last = log.last().unwrap();
        assert_eq!(last.0, Opcode::Continuation);
        assert!(last.1);
        let total: usize = log.iter().map(|(_, _, len)| len).sum();
        assert_eq!(total, payload.len());
    }

    // The echo came back as one oversized message through the heap path.
    {
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].len(), payload.len());
        assert_eq!(received[0], payload.as_bytes());
    }

    endpoint.close(CloseCode::Normal, None).unwrap();
    server.join().unwrap();
}

#[test]
fn connect_rejects_bad_status() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut conn, _) = listener.accept().unwrap();
        let mut chunk = [0u8; 1024];
        while !chunk[..].windows(4).any(|w| w == b"\r\n\r\n") {
            if conn.read(&mut chunk).unwrap_or(0) == 0 {
                break;
            }
        }
        let _ = conn.write_all(b"HTTP/1.1 404 Not Found\r\n\r\n");
    });

    let mut endpoint = Endpoint::new();
    let err = endpoint
        .connect(&format!("ws://127.0.0.1:{port}"), "/")
        .unwrap_err();

    assert!(err.to_string().contains("404"));
    assert!(!endpoint.is_open());
    assert!(endpoint.status());
    assert!(endpoint.error_message().contains("404"));

    server.join().unwrap();
}

#[test]
fn connect_rejects_bad_accept_key() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut conn, _) = listener.accept().unwrap();
        let mut head = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = conn.read(&mut chunk).unwrap_or(0);
            if n == 0 {
                return;
            }
            head.extend_from_slice(&chunk[..n]);
            if head.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        let _ = conn.write_all(
            b"HTTP/1.1 101 Switching Protocols\r\n\
              Upgrade: websocket\r\n\
              Connection: Upgrade\r\n\
              Sec-WebSocket-Accept: bm90IHRoZSByaWdodCBrZXk=\r\n\
              \r\n",
        );
    });

    let mut endpoint = Endpoint::new();
    let err = endpoint
        .connect(&format!("ws://127.0.0.1:{port}"), "/")
        .unwrap_err();

    assert!(err.to_string().contains("Sec-WebSocket-Accept"));
    assert!(!endpoint.is_open());
    assert!(endpoint.status());

    server.join().unwrap();
}

#[cfg(feature = "transport-tls")]
mod tls_tests {
    use super::*;
    use rcgen::{
        BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa,
    };

    #[test]
    fn wss_echo_roundtrip_with_sni() {
        // Self-signed CA plus a server certificate for localhost, signed by
        // the CA, matching what a name-based virtual host would present.
        let mut ca_params = CertificateParams::default();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let mut ca_dn = DistinguishedName::new();
        ca_dn.push(DnType::CommonName, "tidesock-test-ca");
        ca_params.distinguished_name = ca_dn;
        let ca_cert = Certificate::from_params(ca_params).unwrap();

        let mut server_params = CertificateParams::new(vec!["localhost".to_string()]);
        let mut server_dn = DistinguishedName::new();
        server_dn.push(DnType::CommonName, "localhost");
        server_params.distinguished_name = server_dn;
        server_params.alg = &rcgen::PKCS_ECDSA_P256_SHA256;
        let server_cert = Certificate::from_params(server_params).unwrap();

        let server_der = server_cert.serialize_der_with_signer(&ca_cert).unwrap();
        let server_key_der = server_cert.serialize_private_key_der();
        let ca_pem = ca_cert.serialize_pem().unwrap();

        let server_config = rustls::ServerConfig::builder()
            .with_safe_defaults()
            .with_no_client_auth()
            .with_single_cert(
                vec![rustls::Certificate(server_der)],
                rustls::PrivateKey(server_key_der),
            )
            .unwrap();
        let server_config = Arc::new(server_config);

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (tcp, _) = listener.accept().unwrap();
            let conn = rustls::ServerConnection::new(server_config).unwrap();
            let mut tls = rustls::StreamOwned::new(conn, tcp);
            serve_echo(&mut tls, None);
        });

        let mut ca_file = tempfile::NamedTempFile::new().unwrap();
        ca_file.write_all(ca_pem.as_bytes()).unwrap();

        let config = ClientConfig::default().ca_file(ca_file.path());
        let received = Arc::new(Mutex::new(Vec::new()));
        let mut endpoint = Endpoint::with_config(config);
        endpoint.set_on_message(capture_sink(Arc::clone(&received)));

        // SNI comes from the URL host; the certificate only matches
        // "localhost", so validation passing proves the name went out.
        endpoint
            .connect(&format!("wss://localhost:{port}"), "/")
            .unwrap();

        endpoint.send("hello over tls").unwrap();
        endpoint.read_message().unwrap();

        {
            let received = received.lock().unwrap();
            assert_eq!(received.len(), 1);
            assert_eq!(received[0], b"hello over tls");
        }

        endpoint.close(CloseCode::Normal, None).unwrap();
        assert!(!endpoint.is_open());
        assert!(!endpoint.status());

        server.join().unwrap();
    }
}
