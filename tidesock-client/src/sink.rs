//! User-supplied receive sinks
//!
//! Completed messages and pong payloads are handed to caller-supplied
//! callables rather than returned, so the application decides where bytes
//! land without the endpoint buffering past delivery.

/// Sink invoked with a delivered payload.
///
/// Arguments are the payload bytes and the capacity of the buffer they live
/// in (the fixed reassembly buffer size, or the size of the one-shot heap
/// buffer for oversized messages). The payload slice is only valid for the
/// duration of the call.
///
/// The returned `bool` is **ignored** by the endpoint. It exists so a sink
/// can `return early` out of its own body; it is not a control channel and
/// the endpoint never branches on it.
pub type MessageSink = Box<dyn FnMut(&[u8], usize) -> bool + Send>;
