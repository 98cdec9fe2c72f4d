//! URP block framing.
//!
//! Messages travel in blocks behind an 8-byte header: the payload size and
//! the number of messages in it, both `u32` big-endian. This client writes
//! one message per block and splits incoming blocks with the message codec.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Result, UrpError};

/// Upper bound on a single block, to fail fast on a desynchronized stream.
pub const MAX_BLOCK_SIZE: u32 = 64 * 1024 * 1024;

/// Block-layer framing over any byte stream.
pub struct Transport<S = TcpStream> {
    stream: S,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Send `data` as a block holding a single message.
    pub async fn send_message(&mut self, data: &[u8]) -> Result<()> {
        let mut header = [0u8; 8];
        header[..4].copy_from_slice(&(data.len() as u32).to_be_bytes());
        header[4..].copy_from_slice(&1u32.to_be_bytes());
        self.stream.write_all(&header).await?;
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Receive one block as `(payload, message_count)`.
    pub async fn recv_block(&mut self) -> Result<(Bytes, u32)> {
        let mut header = [0u8; 8];
        if let Err(e) = self.stream.read_exact(&mut header).await {
            return Err(match e.kind() {
                std::io::ErrorKind::UnexpectedEof => UrpError::ConnectionClosed,
                _ => UrpError::Io(e),
            });
        }
        let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let count = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        if size > MAX_BLOCK_SIZE {
            return Err(UrpError::Protocol(format!("block of {size} bytes exceeds limit")));
        }

        let mut payload = BytesMut::zeroed(size as usize);
        self.stream.read_exact(&mut payload).await?;
        Ok((payload.freeze(), count))
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn block_header_layout() {
        let (client, mut server) = duplex(256);
        let mut transport = Transport::new(client);
        transport.send_message(b"abc").await.unwrap();

        let mut raw = [0u8; 11];
        server.read_exact(&mut raw).await.unwrap();
        assert_eq!(&raw, &[0, 0, 0, 3, 0, 0, 0, 1, b'a', b'b', b'c']);
    }

    #[tokio::test]
    async fn messages_arrive_in_order() {
        let (a, b) = duplex(1024);
        let mut sender = Transport::new(a);
        let mut receiver = Transport::new(b);
        sender.send_message(b"first").await.unwrap();
        sender.send_message(b"").await.unwrap();
        sender.send_message(b"third").await.unwrap();

        for expected in [&b"first"[..], b"", b"third"] {
            let (payload, count) = receiver.recv_block().await.unwrap();
            assert_eq!(payload.as_ref(), expected);
            assert_eq!(count, 1);
        }
    }

    #[tokio::test]
    async fn peer_hangup_is_connection_closed() {
        let (a, b) = duplex(64);
        drop(a);
        let mut receiver = Transport::new(b);
        assert!(matches!(
            receiver.recv_block().await,
            Err(UrpError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn oversized_block_is_rejected() {
        let (mut a, b) = duplex(64);
        a.write_all(&[0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 1]).await.unwrap();
        let mut receiver = Transport::new(b);
        assert!(matches!(
            receiver.recv_block().await,
            Err(UrpError::Protocol(_))
        ));
    }
}
