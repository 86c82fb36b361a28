//! Length-prefixed framing over a byte stream: a 4-byte little-endian
//! length prefix followed by a `bincode`-encoded command id and payload,
//! the same pragmatic simplification `ember_core` makes for block and
//! transaction codecs rather than reproducing the original's
//! self-describing binary format byte-for-byte.

use bytes::{Buf, BytesMut};
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::P2pError;

pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Frame {
    pub command_id: u32,
    pub payload: Vec<u8>,
}

pub fn encode_frame(command_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(&(4 + payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&command_id.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

pub fn encode_message<T: Serialize>(command_id: u32, message: &T) -> Result<Vec<u8>, P2pError> {
    let payload = bincode::serialize(message).map_err(|e| P2pError::Codec(e.to_string()))?;
    Ok(encode_frame(command_id, &payload))
}

pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, P2pError> {
    bincode::deserialize(payload).map_err(|e| P2pError::Codec(e.to_string()))
}

/// Reads one length-prefixed frame from `stream`, rejecting declared
/// lengths above [`MAX_FRAME_LEN`] before allocating a buffer for them.
pub async fn read_frame<S: tokio::io::AsyncRead + Unpin>(stream: &mut S) -> Result<Frame, P2pError> {
    let mut len_bytes = [0u8; 4];
    stream.read_exact(&mut len_bytes).await?;
    let len = u32::from_le_bytes(len_bytes);
    if len < 4 || len > MAX_FRAME_LEN {
        return Err(P2pError::Codec(format!("frame length {len} out of bounds")));
    }
    let mut body = BytesMut::zeroed(len as usize);
    stream.read_exact(&mut body).await?;
    let command_id = body.get_u32_le();
    Ok(Frame { command_id, payload: body.to_vec() })
}

pub async fn write_frame<S: tokio::io::AsyncWrite + Unpin>(
    stream: &mut S,
    command_id: u32,
    payload: &[u8],
) -> Result<(), P2pError> {
    stream.write_all(&encode_frame(command_id, payload)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_round_trips_through_an_in_memory_pipe() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, 1001, b"hello").await.unwrap();
        let frame = read_frame(&mut server).await.unwrap();
        assert_eq!(frame.command_id, 1001);
        assert_eq!(frame.payload, b"hello");
    }

    #[test]
    fn encode_message_then_decode_payload_round_trips() {
        use crate::protocol::commands::PingResponse;
        let msg = PingResponse { status: "OK".into(), peer_id: 42 };
        let bytes = bincode::serialize(&msg).unwrap();
        let decoded: PingResponse = decode_payload(&bytes).unwrap();
        assert_eq!(decoded.peer_id, 42);
    }
}
