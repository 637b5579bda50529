//! Echo Client Example
//!
//! Connects to a WebSocket echo server, sends a message, prints the echo and
//! closes cleanly. Pass a `ws://` or `wss://` URL as the first argument.

use tidesock::prelude::*;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:8080".to_string());

    let mut endpoint = Endpoint::new();

    endpoint.set_on_message(Box::new(|payload, _capacity| {
        println!("received: {}", String::from_utf8_lossy(payload));
        true
    }));
    endpoint.set_on_pong(Box::new(|payload, _capacity| {
        println!("pong: {} bytes", payload.len());
        true
    }));

    endpoint.connect(&url, "/")?;
    println!("connected to {url}");

    endpoint.send("Hello, Tidesock!")?;
    endpoint.read_message()?;

    endpoint.ping(b"keepalive")?;
    endpoint.read_message()?;

    endpoint.close(CloseCode::Normal, None)?;
    println!("closed cleanly: {}", !endpoint.status());

    Ok(())
}
