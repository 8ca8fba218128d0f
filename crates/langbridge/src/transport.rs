//! Framed Transport (C1)
//!
//! Reads and writes LSP's wire framing: a `Content-Length: <N>\r\n\r\n`
//! header block followed by exactly `N` bytes of UTF-8 JSON. Whole-message
//! atomicity is the only contract this layer owns — correlation and
//! dispatch live in `rpc`.

use langbridge_core::{Error, Result};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Reads a stream of `Content-Length`-framed JSON-RPC messages.
pub struct FrameReader<R> {
  inner: R,
}

impl<R: AsyncRead + Unpin> FrameReader<BufReader<R>> {
  pub fn new(inner: R) -> Self {
    Self { inner: BufReader::new(inner) }
  }
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
  /// Read the next message. Returns `Ok(None)` on a clean EOF at a frame
  /// boundary (the child closed its stdout after exiting normally).
  /// An EOF in the middle of a header or body is a `TransportClosed` error,
  /// not a clean close.
  pub async fn read_message(&mut self) -> Result<Option<Value>> {
    let mut content_length: Option<usize> = None;
    let mut saw_any_header_line = false;

    loop {
      let mut line = String::new();
      let bytes_read = self
        .inner
        .read_line(&mut line)
        .await
        .map_err(|e| Error::TransportClosed { reason: e.to_string() })?;

      if bytes_read == 0 {
        if saw_any_header_line {
          return Err(Error::TransportClosed {
            reason: "EOF while reading frame header".to_string(),
          });
        }
        return Ok(None);
      }

      let line = line.trim_end_matches(['\r', '\n']);
      if line.is_empty() {
        break;
      }
      saw_any_header_line = true;

      if let Some(value) = line.strip_prefix("Content-Length:") {
        let value: usize = value
          .trim()
          .parse()
          .map_err(|_| Error::ProtocolError(format!("invalid Content-Length: {value}")))?;
        content_length = Some(value);
      } else if line.starts_with("Content-Type:") {
        // Tolerated, not otherwise meaningful to us.
      } else {
        return Err(Error::ProtocolError(format!("unexpected frame header: {line}")));
      }
    }

    let content_length = content_length
      .ok_or_else(|| Error::ProtocolError("frame missing Content-Length header".to_string()))?;

    let mut body = vec![0u8; content_length];
    tokio::io::AsyncReadExt::read_exact(&mut self.inner, &mut body)
      .await
      .map_err(|e| Error::TransportClosed { reason: format!("EOF while reading frame body: {e}") })?;

    let value: Value = serde_json::from_slice(&body)?;
    Ok(Some(value))
  }
}

/// Writes `Content-Length`-framed JSON-RPC messages. Every call performs one
/// buffered write of the header plus body, so concurrent writers sharing a
/// `FrameWriter` behind a lock can never interleave partial frames.
pub struct FrameWriter<W> {
  inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
  pub fn new(inner: W) -> Self {
    Self { inner }
  }

  pub async fn write_message(&mut self, value: &Value) -> Result<()> {
    let body = serde_json::to_vec(value)?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    self.inner.write_all(header.as_bytes()).await?;
    self.inner.write_all(&body).await?;
    self.inner.flush().await?;
    Ok(())
  }
}
