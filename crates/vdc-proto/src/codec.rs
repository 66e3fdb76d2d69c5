//! Length-framed message codec.
//!
//! Every record on the wire is a 2-byte big-endian length `N` followed by
//! exactly `N` bytes of serialized [`wire::Message`], with `N` capped at
//! [`MAX_MESSAGE_SIZE`]. The pure [`encode_frame`]/[`decode_frame`] pair
//! works on buffers; [`read_frame`]/[`write_frame`] do the same over async
//! byte streams.
//!
//! # Invariants
//!
//! - Oversize frames are rejected in both directions before any payload is
//!   read or written; an oversize inbound length is fatal for the session.
//! - End-of-stream while reading the length prefix is a clean peer close;
//!   end-of-stream mid-payload is a framing error.
//!
//! Writers serialize a frame into a single buffer and write it with one
//! call, so concurrent senders sharing a serialized writer interleave only
//! at record boundaries.

use bytes::{BufMut, Bytes, BytesMut};
use prost::Message as _;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    error::{ProtocolError, Result},
    wire,
};

/// Maximum serialized message size, excluding the length prefix.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024;

/// Size of the length prefix preceding every record.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Serialize a message into a complete frame (prefix + payload).
///
/// # Errors
///
/// - [`ProtocolError::FrameTooLarge`] if the serialized message exceeds
///   [`MAX_MESSAGE_SIZE`]
pub fn encode_frame(message: &wire::Message) -> Result<Bytes> {
    let encoded_len = message.encoded_len();
    if encoded_len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: encoded_len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + encoded_len);
    buf.put_u16(encoded_len as u16);
    message
        .encode(&mut buf)
        .map_err(|e| ProtocolError::Encode(e.to_string()))?;

    Ok(buf.freeze())
}

/// Deserialize a message from a frame payload (without the length prefix).
///
/// # Errors
///
/// - [`ProtocolError::FrameTooLarge`] if the payload exceeds
///   [`MAX_MESSAGE_SIZE`]
/// - [`ProtocolError::Decode`] if the payload is not a valid message
pub fn decode_frame(payload: &[u8]) -> Result<wire::Message> {
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: payload.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    wire::Message::decode(payload).map_err(|e| ProtocolError::Decode(e.to_string()))
}

/// Read one framed message from a byte stream.
///
/// Returns `Ok(None)` when the peer closes the connection at a record
/// boundary (end-of-stream while reading the length prefix).
///
/// # Errors
///
/// - [`ProtocolError::FrameTooLarge`] if the length prefix exceeds
///   [`MAX_MESSAGE_SIZE`]; the caller must close the session
/// - [`ProtocolError::FrameTruncated`] if the stream ends mid-payload
/// - [`ProtocolError::Decode`] if the payload is not a valid message
/// - [`ProtocolError::Io`] on transport failure
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<wire::Message>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0_u8; LENGTH_PREFIX_SIZE];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let length = usize::from(u16::from_be_bytes(prefix));
    if length > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: length,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut payload = vec![0_u8; length];
    match reader.read_exact(&mut payload).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::FrameTruncated { expected: length });
        }
        Err(e) => return Err(e.into()),
    }

    decode_frame(&payload).map(Some)
}

/// Write one framed message to a byte stream and flush it.
///
/// # Errors
///
/// - [`ProtocolError::FrameTooLarge`] if the serialized message exceeds
///   [`MAX_MESSAGE_SIZE`]
/// - [`ProtocolError::Io`] on transport failure
pub async fn write_frame<W>(writer: &mut W, message: &wire::Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt as _;

    use super::*;
    use crate::wire::ResultCode;

    fn sample_message() -> wire::Message {
        wire::Message::generic_response(3, ResultCode::ErrOk, None)
    }

    #[test]
    fn length_prefix_is_big_endian() {
        let message = sample_message();
        let frame = encode_frame(&message).unwrap();

        let payload_len = frame.len() - LENGTH_PREFIX_SIZE;
        assert_eq!(
            &frame[..LENGTH_PREFIX_SIZE],
            (payload_len as u16).to_be_bytes().as_slice()
        );

        let decoded = decode_frame(&frame[LENGTH_PREFIX_SIZE..]).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn encode_rejects_oversize_message() {
        let message = wire::Message::generic_response(
            1,
            ResultCode::ErrOk,
            Some("x".repeat(MAX_MESSAGE_SIZE + 1)),
        );

        assert!(matches!(
            encode_frame(&message),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn stream_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let message = sample_message();

        write_frame(&mut client, &message).await.unwrap();
        let received = read_frame(&mut server).await.unwrap();

        assert_eq!(received, Some(message));
    }

    #[tokio::test]
    async fn peer_close_reads_as_none() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        assert_eq!(read_frame(&mut server).await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversize_length_prefix_is_fatal() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&0x7FFF_u16.to_be_bytes()).await.unwrap();

        assert!(matches!(
            read_frame(&mut server).await,
            Err(ProtocolError::FrameTooLarge { size: 0x7FFF, .. })
        ));
    }

    #[tokio::test]
    async fn truncated_payload_is_fatal() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&10_u16.to_be_bytes()).await.unwrap();
        client.write_all(&[1, 2, 3]).await.unwrap();
        drop(client);

        assert!(matches!(
            read_frame(&mut server).await,
            Err(ProtocolError::FrameTruncated { expected: 10 })
        ));
    }
}
