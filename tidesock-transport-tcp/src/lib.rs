//! TCP Transport for Tidesock
//!
//! This module provides the plain-TCP transport implementation for WebSocket
//! connections, including the bind-before-connect path used to pin a
//! connection to a specific local interface.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/tidesock-transport-tcp/")]

pub mod tcp;

// Re-export TCP transport types
pub use tcp::TcpStream;

/// Prelude module
pub mod prelude {
    pub use crate::tcp::TcpStream;
    pub use tidesock_core::transport::TransportStream;
}
