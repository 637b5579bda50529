//! WebSocket opening handshake
//!
//! Client-side HTTP upgrade handshake as defined in RFC 6455 Section 4:
//! nonce generation, the upgrade request itself, and validation of the
//! server's `101 Switching Protocols` response.

use crate::error::{HandshakeError, Result};
use crate::protocol::constants::*;
use crate::url::Scheme;
use base64::{engine::general_purpose, Engine as _};
use sha1::{Digest, Sha1};
use std::collections::HashMap;

/// Parsed server handshake response
#[derive(Debug, Clone)]
pub struct UpgradeResponse {
    /// HTTP status code
    pub status: u16,
    /// Headers with names folded to lowercase
    pub headers: HashMap<String, String>,
}

impl UpgradeResponse {
    /// Look up a header by name, regardless of the case it arrived in.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
    }
}

/// Generate a random WebSocket key: 16 random bytes, base64-encoded.
pub fn generate_key() -> String {
    use rand::RngCore;
    let mut key_bytes = [0u8; WEBSOCKET_KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key_bytes);
    general_purpose::STANDARD.encode(key_bytes)
}

/// Compute the expected `Sec-WebSocket-Accept` value for a client key.
pub fn compute_accept_key(client_key: &str) -> String {
    let combined = format!("{}{}", client_key, WEBSOCKET_MAGIC);
    let hash = Sha1::digest(combined.as_bytes());
    general_purpose::STANDARD.encode(hash)
}

/// Validate WebSocket key format
pub fn validate_key(key: &str) -> bool {
    key.len() == 24 && general_purpose::STANDARD.decode(key).is_ok()
}

/// Build the HTTP upgrade request.
///
/// Header order is fixed: request line, `Host`, `Upgrade`, `Connection`,
/// `Sec-WebSocket-Key`, `Sec-WebSocket-Version`. The `Host` value carries a
/// port suffix only when the port differs from the scheme default.
pub fn build_upgrade_request(
    path: &str,
    host: &str,
    port: u16,
    scheme: Scheme,
    key: &str,
) -> String {
    let host_value = if port == scheme.default_port() {
        host.to_string()
    } else {
        format!("{}:{}", host, port)
    };

    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host_value}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: {WEBSOCKET_VERSION}\r\n\
         \r\n"
    )
}

/// Parse the server's handshake response (status line plus headers).
pub fn parse_upgrade_response(response: &str) -> Result<UpgradeResponse> {
    let mut lines = response.lines();

    let status_line = lines
        .next()
        .ok_or_else(|| HandshakeError::InvalidResponse("missing status line".to_string()))?;

    let mut parts = status_line.split_whitespace();
    let version = parts
        .next()
        .ok_or_else(|| HandshakeError::InvalidResponse("missing HTTP version".to_string()))?;

    if version != "HTTP/1.1" {
        return Err(
            HandshakeError::InvalidResponse(format!("unexpected HTTP version: {version}")).into(),
        );
    }

    let status = parts
        .next()
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| HandshakeError::InvalidResponse("invalid status code".to_string()))?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }

        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        } else {
            return Err(
                HandshakeError::InvalidResponse(format!("malformed header line: {line}")).into(),
            );
        }
    }

    Ok(UpgradeResponse { status, headers })
}

/// Validate the server's handshake response against the client key.
pub fn validate_upgrade_response(response: &UpgradeResponse, client_key: &str) -> Result<()> {
    if response.status != 101 {
        return Err(HandshakeError::UnexpectedStatus(response.status).into());
    }

    let accept = response
        .header("Sec-WebSocket-Accept")
        .ok_or(HandshakeError::MissingHeader("Sec-WebSocket-Accept"))?;

    let expected = compute_accept_key(client_key);
    if accept != expected {
        return Err(HandshakeError::InvalidAcceptKey {
            expected,
            received: accept.to_string(),
        }
        .into());
    }

    Ok(())
}

/// Find the end of the HTTP header block (`\r\n\r\n`) in `buf`.
///
/// Returns the index one past the terminator; bytes beyond it belong to the
/// frame stream and must not be discarded.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}
