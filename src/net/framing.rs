//! Length-prefixed framing: 4-byte big-endian length, then that many UTF-8 bytes

use bytes::{BufMut, BytesMut};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted payload
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Transport failures. All of them end the connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge(usize),

    #[error("frame payload is not valid UTF-8")]
    InvalidUtf8,
}

fn eof_is_closed(e: std::io::Error) -> TransportError {
    match e.kind() {
        ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => {
            TransportError::Closed
        }
        _ => TransportError::Io(e),
    }
}

/// Read one whole frame. Closure before the declared length arrives is `Closed`.
pub async fn read_frame<R>(reader: &mut R) -> Result<String, TransportError>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await.map_err(eof_is_closed)? as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(eof_is_closed)?;
    String::from_utf8(payload).map_err(|_| TransportError::InvalidUtf8)
}

/// Write one frame and flush it
pub async fn write_frame<W>(writer: &mut W, payload: &str) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = payload.as_bytes();
    if bytes.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(bytes.len()));
    }

    let mut frame = BytesMut::with_capacity(4 + bytes.len());
    frame.put_u32(bytes.len() as u32);
    frame.put_slice(bytes);

    writer.write_all(&frame).await.map_err(eof_is_closed)?;
    writer.flush().await.map_err(eof_is_closed)?;
    Ok(())
}
