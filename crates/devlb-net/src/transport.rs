//! Record transport over byte channels
//!
//! One fixed-size block per message in both directions. A connection that
//! closes mid-record is a protocol error, not an I/O error: the peer broke
//! the framing contract.

use crate::record::{Record, RECORD_SIZE};
use crate::{Error, Result};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Write one record to the channel
pub async fn send_record<W>(writer: &mut W, record: &Record) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(RECORD_SIZE);
    record.encode(&mut buf);
    writer.write_all(&buf).await?;
    Ok(())
}

/// Read exactly one record from the channel
pub async fn recv_record<R>(reader: &mut R) -> Result<Record>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; RECORD_SIZE];
    reader.read_exact(&mut buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Protocol("connection closed mid-record".to_string())
        } else {
            Error::Io(e)
        }
    })?;
    Record::decode(&buf)
}
