//! Line codec for the MCP stdio transport.
//!
//! Frame format: one UTF-8 JSON document per line, terminated by `\n`
//! (a preceding `\r` is stripped). A final line without a terminator is
//! still delivered. Lines longer than the configured maximum are drained
//! up to the next newline and reported as [`Frame::Oversized`].

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// One unit read from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete line, terminator removed.
    Message(String),
    /// A line that exceeded the limit; carries its length in bytes.
    Oversized(usize),
}

/// Read one line from the stream. Returns `None` on clean EOF.
pub async fn read_message<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    max_bytes: usize,
) -> std::io::Result<Option<Frame>> {
    let limit = (max_bytes as u64).saturating_add(1);
    let mut buf = Vec::new();
    let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() as u64 >= limit {
        let rest = discard_line(reader).await?;
        return Ok(Some(Frame::Oversized(buf.len() + rest)));
    }

    Ok(Some(Frame::Message(String::from_utf8_lossy(&buf).into_owned())))
}

/// Skip input through the next newline (or EOF). Returns bytes skipped,
/// not counting the newline.
async fn discard_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<usize> {
    let mut discarded = 0;
    loop {
        let (consumed, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(discarded);
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(i) => {
                    discarded += i;
                    (i + 1, true)
                }
                None => {
                    discarded += available.len();
                    (available.len(), false)
                }
            }
        };
        reader.consume(consumed);
        if done {
            return Ok(discarded);
        }
    }
}

/// Write one message as a single line and flush.
pub async fn write_message<W: AsyncWrite + Unpin, T: Serialize>(
    writer: &mut W,
    message: &T,
) -> std::io::Result<()> {
    let mut bytes = serde_json::to_vec(message).map_err(|e| {
        tracing::error!("JSON encoding failed: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
    })?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}
