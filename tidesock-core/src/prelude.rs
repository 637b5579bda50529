//! Prelude module for Tidesock Core
//!
//! This module re-exports commonly used types and traits to make them
//! easily accessible for users of the library.

pub use crate::error::{CloseCode, Error, Result};
pub use crate::frame::Frame;
pub use crate::protocol::Opcode;
pub use crate::transport::TransportStream;
pub use crate::url::{Scheme, WsUrl};

// Re-export commonly used external dependencies
pub use bytes::{Bytes, BytesMut};
