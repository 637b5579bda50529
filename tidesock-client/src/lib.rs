//! # Tidesock Client
//!
//! Client-side WebSocket endpoint for Tidesock.
//!
//! An [`Endpoint`] owns exactly one connection at a time: `connect` performs
//! the HTTP upgrade handshake over TCP or TLS, `send` writes text or binary
//! messages (fragmenting oversized payloads), and `read_message` drives one
//! receive cycle, delivering completed messages to a caller-supplied sink.
//!
//! Endpoints are single-threaded: they spawn no tasks, hold no locks, and
//! must not be shared across threads without external synchronization.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/tidesock-client/")]

pub mod config;
pub mod endpoint;
pub mod sink;

// Prelude module with common imports
pub mod prelude;

// Re-export key types for convenience
pub use config::ClientConfig;
pub use endpoint::{ConnectionState, Endpoint};
pub use sink::MessageSink;
