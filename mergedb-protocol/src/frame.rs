//! Binary frame format.
//!
//! Frame layout (4-byte length prefix + body):
//!
//! ```text
//! +-------------+--------------+------------------------+
//! | length      | message code | payload                |
//! | 4 bytes, BE |   1 byte     | length - 1 bytes       |
//! +-------------+--------------+------------------------+
//! ```
//!
//! The length field covers the code byte plus the payload, so a frame with
//! an empty payload has length 1. The code byte is the first body byte.

use crate::error::ProtocolError;
use crate::MAX_PAYLOAD_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Fixed message-code registry.
///
/// These codes are a compatibility contract with the server and must not
/// change. Code 0 always introduces an error payload, regardless of which
/// request was sent.
pub mod code {
    /// Error response (any operation).
    pub const ERROR: u8 = 0;
    /// Operation response, shared by update and abort.
    pub const OPERATION_RESP: u8 = 111;
    /// Read objects request.
    pub const READ_OBJECTS: u8 = 116;
    /// Update objects request.
    pub const UPDATE_OBJECTS: u8 = 118;
    /// Start transaction request.
    pub const START_TRANSACTION: u8 = 119;
    /// Abort transaction request.
    pub const ABORT_TRANSACTION: u8 = 120;
    /// Commit transaction request.
    pub const COMMIT_TRANSACTION: u8 = 121;
    /// Static update objects request.
    pub const STATIC_UPDATE_OBJECTS: u8 = 122;
    /// Static read objects request.
    pub const STATIC_READ_OBJECTS: u8 = 123;
    /// Start transaction response.
    pub const START_TRANSACTION_RESP: u8 = 124;
    /// Read objects response.
    pub const READ_OBJECTS_RESP: u8 = 126;
    /// Commit response, also returned for static updates.
    pub const COMMIT_RESP: u8 = 127;
    /// Static read objects response.
    pub const STATIC_READ_OBJECTS_RESP: u8 = 128;
}

/// A parsed frame: one message code plus its serialized payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message-type code, the first body byte on the wire.
    pub code: u8,
    /// Serialized message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new frame with the given code and payload.
    pub fn new(code: u8, payload: Bytes) -> Self {
        Self { code, payload }
    }

    /// Creates a frame by serializing a message payload.
    pub fn from_msg<T: serde::Serialize>(code: u8, msg: &T) -> Result<Self, ProtocolError> {
        let payload = serde_json::to_vec(msg)?;
        Ok(Self::new(code, Bytes::from(payload)))
    }

    /// Encodes the frame into a single buffer.
    ///
    /// The whole frame is returned as one contiguous buffer so callers can
    /// issue a single write per frame and never interleave two frames on
    /// the same stream.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let payload_len = self.payload.len() as u32;
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + 1 + self.payload.len());

        // Length covers the code byte plus the payload.
        buf.put_u32(payload_len + 1);
        buf.put_u8(self.code);
        buf.put_slice(&self.payload);

        Ok(buf)
    }

    /// Decodes a frame from a buffer.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        // Peek at the length without consuming.
        let body_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if body_len == 0 {
            return Err(ProtocolError::EmptyFrame);
        }
        if body_len - 1 > MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::FrameTooLarge {
                size: (body_len - 1) as u32,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        if buf.len() < LENGTH_PREFIX_SIZE + body_len {
            return Ok(None);
        }

        buf.advance(LENGTH_PREFIX_SIZE);
        let code = buf[0];
        buf.advance(1);
        let payload = buf.split_to(body_len - 1).freeze();

        Ok(Some(Self { code, payload }))
    }
}
