//! Async frame I/O over any byte stream.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    Frame, FrameHeader,
    errors::{ProtocolError, Result},
};

/// Read one frame from `reader`.
///
/// Returns `Ok(None)` when the stream ends cleanly on a frame boundary.
///
/// # Errors
///
/// - `ProtocolError::FrameTruncated` if the stream ends mid-frame
/// - Header validation errors from [`FrameHeader::from_bytes`]
/// - `ProtocolError::Io` on read failure
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header_buf = [0u8; FrameHeader::SIZE];
    let filled = read_full(reader, &mut header_buf).await?;
    if filled == 0 {
        return Ok(None);
    }
    if filled < FrameHeader::SIZE {
        return Err(ProtocolError::FrameTruncated { expected: FrameHeader::SIZE, actual: filled });
    }

    let header = *FrameHeader::from_bytes(&header_buf)?;
    let payload_size = header.payload_size() as usize;

    let mut payload = vec![0u8; payload_size];
    let filled = read_full(reader, &mut payload).await?;
    if filled < payload_size {
        return Err(ProtocolError::FrameTruncated { expected: payload_size, actual: filled });
    }

    Ok(Some(Frame::new(header, payload)))
}

/// Write one frame to `writer` and flush it.
///
/// # Errors
///
/// - `ProtocolError::PayloadTooLarge` if the frame exceeds the size limit
/// - `ProtocolError::Io` on write failure
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = Vec::with_capacity(frame.encoded_len());
    frame.encode(&mut buf)?;

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Fill `buf` until it is full or the stream ends. Returns bytes read.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChatMessage, Payload};

    fn message_frame(body: &str) -> Frame {
        Payload::from(ChatMessage::new("alice", body)).into_frame().expect("encode")
    }

    #[tokio::test]
    async fn clean_eof_is_none() {
        let mut empty: &[u8] = &[];
        assert_eq!(read_frame(&mut empty).await, Ok(None));
    }

    #[tokio::test]
    async fn frames_are_read_in_order() {
        let mut wire = Vec::new();
        write_frame(&mut wire, &message_frame("one")).await.expect("write");
        write_frame(&mut wire, &message_frame("two")).await.expect("write");

        let mut reader = &wire[..];
        let first = read_frame(&mut reader).await.expect("read").expect("frame");
        let second = read_frame(&mut reader).await.expect("read").expect("frame");

        assert_eq!(first, message_frame("one"));
        assert_eq!(second, message_frame("two"));
        assert_eq!(read_frame(&mut reader).await, Ok(None));
    }

    #[tokio::test]
    async fn eof_inside_header_is_truncation() {
        let mut wire = Vec::new();
        write_frame(&mut wire, &message_frame("hello")).await.expect("write");

        let mut reader = &wire[..5];
        assert_eq!(
            read_frame(&mut reader).await,
            Err(ProtocolError::FrameTruncated { expected: FrameHeader::SIZE, actual: 5 })
        );
    }

    #[tokio::test]
    async fn eof_inside_payload_is_truncation() {
        let frame = message_frame("hello");
        let mut wire = Vec::new();
        write_frame(&mut wire, &frame).await.expect("write");

        let mut reader = &wire[..wire.len() - 1];
        assert_eq!(
            read_frame(&mut reader).await,
            Err(ProtocolError::FrameTruncated {
                expected: frame.payload.len(),
                actual: frame.payload.len() - 1,
            })
        );
    }

    #[tokio::test]
    async fn duplex_stream_delivers_frames() {
        let (mut client, mut server) = tokio::io::duplex(64);

        let writer = tokio::spawn(async move {
            write_frame(&mut client, &message_frame("over the pipe")).await.expect("write");
        });

        let frame = read_frame(&mut server).await.expect("read").expect("frame");
        writer.await.expect("join");
        assert_eq!(frame, message_frame("over the pipe"));
    }
}
