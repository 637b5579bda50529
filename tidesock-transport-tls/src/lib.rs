//! TLS Transport for Tidesock
//!
//! This module provides the rustls-based transport implementation for secure
//! WebSocket connections, including SNI configuration from the target host.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/tidesock-transport-tls/")]

pub mod tls;

// Re-export TLS transport types
pub use tls::TlsStream;

/// Prelude module
pub mod prelude {
    pub use crate::tls::TlsStream;
    pub use tidesock_core::transport::TransportStream;
}
