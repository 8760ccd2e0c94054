//! Async frame I/O: typed encode to and decode from a byte stream.

use crate::error::ProtocolError;
use crate::frame::{code, Frame, LENGTH_PREFIX_SIZE};
use crate::message::ErrorResp;
use crate::MAX_PAYLOAD_SIZE;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Serializes `msg` and writes it as one frame tagged with `msg_code`.
///
/// The frame is assembled into a single buffer and written in one call, so
/// two frames never interleave on the same stream.
pub async fn write_msg<W, T>(writer: &mut W, msg_code: u8, msg: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = Frame::from_msg(msg_code, msg)?;
    let buf = frame.encode()?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads exactly one frame from the stream.
///
/// Reads the 4-byte length prefix, then exactly that many body bytes. A
/// stream that closes before either read completes yields a transport
/// error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];
    reader.read_exact(&mut len_buf).await?;

    let body_len = u32::from_be_bytes(len_buf) as usize;
    if body_len == 0 {
        return Err(ProtocolError::EmptyFrame);
    }
    if body_len - 1 > MAX_PAYLOAD_SIZE as usize {
        return Err(ProtocolError::FrameTooLarge {
            size: (body_len - 1) as u32,
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut body = vec![0u8; body_len];
    reader.read_exact(&mut body).await?;

    let msg_code = body[0];
    let payload = Bytes::from(body).slice(1..);
    Ok(Frame::new(msg_code, payload))
}

/// Dispatches one frame to a typed payload.
///
/// Code 0 always decodes as an error payload and yields
/// [`ProtocolError::Server`], regardless of which response was expected.
/// Any code other than `success_code` is a protocol violation.
pub fn decode_frame<T>(frame: &Frame, success_code: u8) -> Result<T, ProtocolError>
where
    T: DeserializeOwned,
{
    match frame.code {
        code::ERROR => {
            let resp: ErrorResp = serde_json::from_slice(&frame.payload)?;
            Err(ProtocolError::Server {
                code: resp.error_code,
                message: String::from_utf8_lossy(&resp.error_message).into_owned(),
            })
        }
        c if c == success_code => Ok(serde_json::from_slice(&frame.payload)?),
        actual => Err(ProtocolError::UnexpectedCode {
            expected: success_code,
            actual,
        }),
    }
}

/// Reads one frame and decodes it, expecting `success_code`.
pub async fn read_msg<R, T>(reader: &mut R, success_code: u8) -> Result<T, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let frame = read_frame(reader).await?;
    decode_frame(&frame, success_code)
}
