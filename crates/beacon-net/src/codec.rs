use std::io;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use libp2p::request_response::Codec;
use libp2p::StreamProtocol;
use serde::{de::DeserializeOwned, Serialize};

/// Per-message size ceiling. Generous relative to a beacon record or a
/// bounded `SyncChain` batch, but enough to stop an unbounded read from
/// a misbehaving or hostile peer. Mirrors
/// `forest_libp2p::rpc::protocol`'s `MAX_BYTES_ALLOWED` guard.
pub const MAX_BYTES_ALLOWED: usize = 16 * 1024 * 1024;

const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// A `request_response::Codec` that frames CBOR-encoded values behind
/// an unsigned-varint length prefix, the same "length-prefixed framed
/// RPC" shape `forest_libp2p::rpc::codec`'s `InboundCodec`/`OutboundCodec`
/// give the blocksync protocol, generalized to any serde request/response
/// pair via one generic codec instead of one hand-written codec per
/// protocol.
#[derive(Clone, Default)]
pub struct LengthPrefixedCbor<Req, Resp> {
    _marker: PhantomData<fn() -> (Req, Resp)>,
}

impl<Req, Resp> LengthPrefixedCbor<Req, Resp> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

async fn read_framed<T>(io: &mut T) -> io::Result<Vec<u8>>
where
    T: AsyncRead + Unpin + Send,
{
    let len = unsigned_varint::aio::read_u32(&mut *io)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))? as usize;
    if len > MAX_BYTES_ALLOWED {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds the {MAX_BYTES_ALLOWED} byte ceiling"),
        ));
    }
    let mut buf = vec![0u8; len];
    io.read_exact(&mut buf).await?;
    Ok(buf)
}

async fn write_framed<T>(io: &mut T, bytes: &[u8]) -> io::Result<()>
where
    T: AsyncWrite + Unpin + Send,
{
    if bytes.len() > MAX_BYTES_ALLOWED {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame of {} bytes exceeds the {MAX_BYTES_ALLOWED} byte ceiling", bytes.len()),
        ));
    }
    let mut len_buf = unsigned_varint::encode::u32_buffer();
    let encoded_len = unsigned_varint::encode::u32(bytes.len() as u32, &mut len_buf);
    io.write_all(encoded_len).await?;
    io.write_all(bytes).await?;
    io.flush().await
}

fn encode<V: Serialize>(value: &V) -> io::Result<Vec<u8>> {
    cbor4ii::serde::to_vec(Vec::new(), value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

fn decode<V: DeserializeOwned>(bytes: &[u8]) -> io::Result<V> {
    cbor4ii::serde::from_slice(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

#[async_trait]
impl<Req, Resp> Codec for LengthPrefixedCbor<Req, Resp>
where
    Req: Serialize + DeserializeOwned + Send + 'static,
    Resp: Serialize + DeserializeOwned + Send + 'static,
{
    type Protocol = StreamProtocol;
    type Request = Req;
    type Response = Resp;

    async fn read_request<T>(&mut self, _: &Self::Protocol, io: &mut T) -> io::Result<Req>
    where
        T: AsyncRead + Unpin + Send,
    {
        let bytes = tokio::time::timeout(IO_TIMEOUT, read_framed(io))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "read_request timed out"))??;
        decode(&bytes)
    }

    async fn read_response<T>(&mut self, _: &Self::Protocol, io: &mut T) -> io::Result<Resp>
    where
        T: AsyncRead + Unpin + Send,
    {
        let bytes = tokio::time::timeout(IO_TIMEOUT, read_framed(io))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "read_response timed out"))??;
        decode(&bytes)
    }

    async fn write_request<T>(&mut self, _: &Self::Protocol, io: &mut T, req: Req) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        let bytes = encode(&req)?;
        write_framed(io, &bytes).await
    }

    async fn write_response<T>(&mut self, _: &Self::Protocol, io: &mut T, resp: Resp) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        let bytes = encode(&resp)?;
        write_framed(io, &bytes).await
    }
}
