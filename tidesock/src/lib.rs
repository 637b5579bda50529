//! # Tidesock
//!
//! **Client-side RFC 6455 WebSocket endpoint over blocking TCP or TLS**
//!
//! Tidesock keeps one connection per [`Endpoint`]: it performs the HTTP
//! upgrade handshake, frames and masks outgoing messages (fragmenting large
//! payloads), reassembles incoming fragments around interleaved control
//! frames, and hands completed messages to a caller-supplied sink. No async
//! runtime, no background threads.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tidesock::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let mut endpoint = Endpoint::new();
//!     endpoint.set_on_message(Box::new(|payload, _capacity| {
//!         println!("received {} bytes", payload.len());
//!         true
//!     }));
//!
//!     endpoint.connect("ws://127.0.0.1:8080", "/")?;
//!     endpoint.send("hello")?;
//!     endpoint.read_message()?;
//!     endpoint.close(CloseCode::Normal, None)?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/tidesock/")]

// Re-export core components
pub use tidesock_core::*;

#[cfg(feature = "transport-tcp")]
pub use tidesock_transport_tcp as transport_tcp;

#[cfg(feature = "transport-tls")]
pub use tidesock_transport_tls as transport_tls;

#[cfg(feature = "client")]
pub use tidesock_client as client;

#[cfg(feature = "client")]
pub use tidesock_client::{ClientConfig, ConnectionState, Endpoint, MessageSink};

/// Prelude module with common imports
pub mod prelude {
    pub use tidesock_core::prelude::*;

    #[cfg(feature = "client")]
    pub use tidesock_client::prelude::*;

    #[cfg(feature = "transport-tcp")]
    pub use tidesock_transport_tcp::prelude::*;

    #[cfg(feature = "transport-tls")]
    pub use tidesock_transport_tls::prelude::*;
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_library_compiles() {
        assert_eq!(env!("CARGO_PKG_NAME"), "tidesock");
    }
}
