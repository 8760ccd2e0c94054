//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur during framing or message exchange.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Short or failed read/write on an otherwise live stream. Fatal for
    /// that connection: callers must discard it, not reuse it.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("frame body is empty, missing message code")]
    EmptyFrame,

    /// The leading body byte matched neither the expected success code nor
    /// the error code. Indicates a protocol-version mismatch with the server.
    #[error("unexpected message code {actual} (expected {expected})")]
    UnexpectedCode { expected: u8, actual: u8 },

    /// Application-level failure decoded from a code-0 error frame.
    #[error("server error code {code}: {message}")]
    Server { code: u32, message: String },

    #[error("payload serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
