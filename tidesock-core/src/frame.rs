//! WebSocket frame parsing and serialization
//!
//! This module provides frame parsing and serialization following the
//! RFC 6455 WebSocket protocol specification. Decoding is incremental:
//! [`Frame::parse`] reports [`FrameError::InsufficientData`] until a whole
//! frame is buffered, so callers can keep feeding transport reads into the
//! same buffer.

use crate::{
    error::{Error, FrameError, Result},
    protocol::{constants::MAX_CONTROL_PAYLOAD, frame_bits::*, Opcode},
};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Represents a WebSocket frame according to RFC 6455
#[derive(Debug, Clone)]
pub struct Frame {
    /// Indicates if this is the final frame in a message
    pub fin: bool,
    /// Reserved bits (RSV1, RSV2, RSV3)
    pub rsv: [bool; 3],
    /// Frame opcode
    pub opcode: Opcode,
    /// Indicates if the payload is masked
    pub masked: bool,
    /// Masking key (if present)
    pub mask: Option<[u8; 4]>,
    /// Payload data
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame with the given opcode and payload
    pub fn new(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            rsv: [false; 3],
            opcode,
            masked: false,
            mask: None,
            payload: payload.into(),
        }
    }

    /// Create a continuation frame
    pub fn continuation(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Continuation, payload)
    }

    /// Create a text frame
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Text, payload)
    }

    /// Create a binary frame
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Binary, payload)
    }

    /// Create a close frame with optional code and reason
    pub fn close(code: Option<u16>, reason: Option<&str>) -> Self {
        let mut payload = BytesMut::new();

        if let Some(code) = code {
            payload.put_u16(code);
        }

        if let Some(reason) = reason {
            payload.put_slice(reason.as_bytes());
        }

        Self::new(Opcode::Close, payload.freeze())
    }

    /// Create a ping frame
    pub fn ping(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Ping, payload)
    }

    /// Create a pong frame
    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Pong, payload)
    }

    /// Set the FIN bit
    pub fn fin(mut self, fin: bool) -> Self {
        self.fin = fin;
        self
    }

    /// Apply masking to the frame (required on all client frames)
    pub fn mask(mut self, enabled: bool) -> Self {
        if enabled && !self.masked {
            let mask = rand::random::<[u8; 4]>();
            self.payload = mask_bytes(&self.payload, &mask);
            self.masked = true;
            self.mask = Some(mask);
        } else if !enabled && self.masked {
            if let Some(mask) = self.mask {
                self.payload = mask_bytes(&self.payload, &mask);
            }
            self.masked = false;
            self.mask = None;
        }
        self
    }

    /// Serialize the frame to bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Write the frame to a buffer
    pub fn write_to(&self, buf: &mut BytesMut) {
        let first_byte = ((self.fin as u8) << 7)
            | ((self.rsv[0] as u8) << 6)
            | ((self.rsv[1] as u8) << 5)
            | ((self.rsv[2] as u8) << 4)
            | self.opcode.value();
        buf.put_u8(first_byte);

        let payload_len = self.payload.len();
        let mask_bit = (self.masked as u8) << 7;

        if payload_len < 126 {
            buf.put_u8(mask_bit | payload_len as u8);
        } else if payload_len <= u16::MAX as usize {
            buf.put_u8(mask_bit | PAYLOAD_LEN_16);
            buf.put_u16(payload_len as u16);
        } else {
            buf.put_u8(mask_bit | PAYLOAD_LEN_64);
            buf.put_u64(payload_len as u64);
        }

        if let Some(mask) = self.mask {
            buf.put_slice(&mask);
        }

        buf.put_slice(&self.payload);
    }

    /// Parse a frame from the front of `buf`, advancing past it on success.
    ///
    /// Masked frames are unmasked during parsing. Whether a masked frame is
    /// acceptable at all depends on the caller's role; the parsed frame's
    /// [`masked`](Frame::masked) flag carries the answer.
    pub fn parse(buf: &mut BytesMut) -> Result<Self> {
        if buf.len() < 2 {
            return Err(FrameError::InsufficientData {
                needed: 2,
                have: buf.len(),
            }
            .into());
        }

        let mut cursor = std::io::Cursor::new(&buf[..]);

        let first_byte = cursor.get_u8();
        let fin = (first_byte & FIN_BIT) != 0;
        let rsv1 = (first_byte & RSV1_BIT) != 0;
        let rsv2 = (first_byte & RSV2_BIT) != 0;
        let rsv3 = (first_byte & RSV3_BIT) != 0;
        let opcode = Opcode::from_u8(first_byte & OPCODE_MASK)
            .ok_or(FrameError::InvalidOpcode(first_byte & OPCODE_MASK))?;

        let second_byte = cursor.get_u8();
        let masked = (second_byte & MASK_BIT) != 0;
        let mut payload_len = (second_byte & PAYLOAD_LEN_MASK) as usize;

        if payload_len == 126 {
            if buf.len() < 4 {
                return Err(FrameError::InsufficientData {
                    needed: 4,
                    have: buf.len(),
                }
                .into());
            }
            payload_len = cursor.get_u16() as usize;
        } else if payload_len == 127 {
            if buf.len() < 10 {
                return Err(FrameError::InsufficientData {
                    needed: 10,
                    have: buf.len(),
                }
                .into());
            }
            payload_len = cursor.get_u64() as usize;
        }

        let mask = if masked {
            if buf.len() < cursor.position() as usize + MASKING_KEY_LEN {
                return Err(FrameError::InsufficientData {
                    needed: cursor.position() as usize + MASKING_KEY_LEN,
                    have: buf.len(),
                }
                .into());
            }
            let mut mask = [0u8; 4];
            cursor.copy_to_slice(&mut mask);
            Some(mask)
        } else {
            None
        };

        let payload_start = cursor.position() as usize;
        if buf.len() < payload_start + payload_len {
            return Err(FrameError::InsufficientData {
                needed: payload_start + payload_len,
                have: buf.len(),
            }
            .into());
        }

        let mut payload = Bytes::copy_from_slice(&buf[payload_start..payload_start + payload_len]);

        if let Some(mask) = mask {
            payload = mask_bytes(&payload, &mask);
        }

        buf.advance(payload_start + payload_len);

        // Validation happens only after the whole frame has been consumed so
        // a poisoned frame cannot be re-parsed forever.
        if opcode.is_control() && !fin {
            return Err(FrameError::FragmentedControlFrame.into());
        }

        if opcode.is_control() && payload_len > MAX_CONTROL_PAYLOAD {
            return Err(FrameError::ControlPayloadTooLarge { len: payload_len }.into());
        }

        if rsv1 || rsv2 || rsv3 {
            return Err(FrameError::ReservedBitsSet.into());
        }

        Ok(Frame {
            fin,
            rsv: [rsv1, rsv2, rsv3],
            opcode,
            masked,
            mask,
            payload,
        })
    }

    /// Get the payload length
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Check if this is a control frame
    pub fn is_control(&self) -> bool {
        self.opcode.is_control()
    }

    /// Check if this is a data frame
    pub fn is_data(&self) -> bool {
        self.opcode.is_data()
    }

    /// Status code carried by a close frame, if any
    pub fn close_code(&self) -> Option<u16> {
        if self.opcode == Opcode::Close && self.payload.len() >= 2 {
            Some(u16::from_be_bytes([self.payload[0], self.payload[1]]))
        } else {
            None
        }
    }
}

/// True when the error is the codec's "keep reading" signal.
pub fn is_incomplete(err: &Error) -> bool {
    matches!(err, Error::Frame(FrameError::InsufficientData { .. }))
}

/// Apply masking to bytes
fn mask_bytes(data: &[u8], mask: &[u8; 4]) -> Bytes {
    let mut masked = BytesMut::with_capacity(data.len());
    for (i, &byte) in data.iter().enumerate() {
        masked.put_u8(byte ^ mask[i % 4]);
    }
    masked.freeze()
}
