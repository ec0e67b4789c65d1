use async_trait::async_trait;
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use libp2p::request_response::Codec;
use libp2p::StreamProtocol;
use std::io;

use super::envelope::{Envelope, Incoming};
use crate::error::Result;

/// Protocol identifier of the chat data channel
pub const CHAT_PROTOCOL: StreamProtocol = StreamProtocol::new("/peerchat/chat/1.0.0");

/// Largest payload accepted on the data channel
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// One encoded envelope as carried by a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(pub Vec<u8>);

impl Frame {
    pub fn from_envelope(envelope: &Envelope) -> Result<Self> {
        Ok(Self(envelope.to_bytes()?))
    }

    pub fn decode(&self) -> Result<Incoming> {
        Envelope::decode(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Empty acknowledgement returned for every delivered frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ack;

/// Length-prefixed codec for the chat data channel
#[derive(Default, Debug, Clone)]
pub struct ChatCodec;

async fn read_frame<T>(io: &mut T) -> io::Result<Vec<u8>>
where
    T: AsyncRead + Unpin + Send,
{
    // Read length prefix (4 bytes)
    let mut len_bytes = [0u8; 4];
    io.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes) as usize;

    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds limit of {}", len, MAX_FRAME_LEN),
        ));
    }

    let mut buffer = vec![0u8; len];
    io.read_exact(&mut buffer).await?;
    Ok(buffer)
}

async fn write_frame<T>(io: &mut T, data: &[u8]) -> io::Result<()>
where
    T: AsyncWrite + Unpin + Send,
{
    if data.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame of {} bytes exceeds limit of {}", data.len(), MAX_FRAME_LEN),
        ));
    }

    let len = data.len() as u32;
    io.write_all(&len.to_be_bytes()).await?;
    io.write_all(data).await?;
    io.flush().await?;
    Ok(())
}

#[async_trait]
impl Codec for ChatCodec {
    type Protocol = StreamProtocol;
    type Request = Frame;
    type Response = Ack;

    async fn read_request<T>(&mut self, _protocol: &Self::Protocol, io: &mut T) -> io::Result<Self::Request>
    where
        T: AsyncRead + Unpin + Send,
    {
        read_frame(io).await.map(Frame)
    }

    async fn read_response<T>(&mut self, _protocol: &Self::Protocol, io: &mut T) -> io::Result<Self::Response>
    where
        T: AsyncRead + Unpin + Send,
    {
        read_frame(io).await?;
        Ok(Ack)
    }

    async fn write_request<T>(&mut self, _protocol: &Self::Protocol, io: &mut T, req: Self::Request) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        write_frame(io, &req.0).await
    }

    async fn write_response<T>(&mut self, _protocol: &Self::Protocol, io: &mut T, _res: Self::Response) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        write_frame(io, &[]).await
    }
}
