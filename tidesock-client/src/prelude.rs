//! Prelude module for Tidesock Client
//!
//! This module re-exports commonly used types and traits to make them
//! easily accessible for users of the library.

pub use crate::config::ClientConfig;
pub use crate::endpoint::{ConnectionState, Endpoint};
pub use crate::sink::MessageSink;
pub use tidesock_core::error::{CloseCode, Error, Result};
