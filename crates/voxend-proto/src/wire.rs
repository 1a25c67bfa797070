//! Async stream helpers for reading and writing wire values.
//!
//! Every read goes through `read_exact`, so partial reads on a real
//! stream are retried internally for all field widths, not just bulk
//! payloads. A stream that ends mid-field surfaces as an I/O error,
//! which the dispatch loops treat as a stream framing error.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::{FixedWire, WireDecode, WireEncode};
use crate::error::WireError;

/// Largest fixed-width wire value (the ENTITY_ADD payload).
const MAX_FIXED: usize = 64;

/// Read one fixed-width value from the stream.
pub async fn read_value<R, T>(r: &mut R) -> Result<T, WireError>
where
    R: AsyncRead + Unpin,
    T: WireDecode + FixedWire,
{
    debug_assert!(T::WIRE_SIZE <= MAX_FIXED);
    let mut buf = [0u8; MAX_FIXED];
    let field = &mut buf[..T::WIRE_SIZE];
    r.read_exact(field).await?;
    let mut slice: &[u8] = field;
    T::wire_decode(&mut slice)
}

/// Write one value to the stream. No partial-write retry beyond what
/// `write_all` already provides.
pub async fn write_value<W, T>(w: &mut W, value: &T) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
    T: WireEncode + ?Sized,
{
    let mut buf = BytesMut::new();
    value.wire_encode(&mut buf);
    w.write_all(&buf).await?;
    Ok(())
}

/// Read exactly `len` payload bytes, looping until the full payload
/// has arrived or the connection reports a hard failure.
pub async fn read_payload<R>(r: &mut R, len: usize) -> Result<Vec<u8>, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut data = vec![0u8; len];
    r.read_exact(&mut data).await?;
    Ok(data)
}

/// Read a u16-length-prefixed UTF-8 string.
pub async fn read_string<R>(r: &mut R) -> Result<String, WireError>
where
    R: AsyncRead + Unpin,
{
    let len: u16 = read_value(r).await?;
    let data = read_payload(r, len as usize).await?;
    String::from_utf8(data).map_err(|_| WireError::InvalidUtf8)
}

/// Write a u16-length-prefixed UTF-8 string.
pub async fn write_string<W>(w: &mut W, s: &str) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    if s.len() > u16::MAX as usize {
        return Err(WireError::StringTooLong(s.len()));
    }
    write_value(w, &(s.len() as u16)).await?;
    w.write_all(s.as_bytes()).await?;
    Ok(())
}
