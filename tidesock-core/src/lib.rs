//! # Tidesock Core
//!
//! Core WebSocket protocol implementation providing the foundation for the
//! Tidesock client library.
//!
//! This crate holds everything that is independent of a concrete transport:
//!
//! - Error handling and types
//! - WebSocket frame parsing and generation
//! - Opening handshake (HTTP upgrade) helpers
//! - `ws`/`wss` URL parsing
//! - Protocol constants and utilities
//! - Transport layer abstraction and the SIGPIPE I/O guard

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/tidesock-core/")]

// Core modules
pub mod error;
pub mod frame;
pub mod handshake;
pub mod protocol;
pub mod sigpipe;
pub mod transport;
pub mod url;

// Prelude module with common imports
pub mod prelude;

// Re-export key types for convenience
pub use error::{CloseCode, Error, Result};
pub use frame::Frame;
pub use protocol::Opcode;
pub use sigpipe::SigpipeGuard;
pub use transport::TransportStream;
pub use url::{Scheme, WsUrl};
