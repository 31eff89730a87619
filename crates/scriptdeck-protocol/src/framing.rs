//! Newline-delimited JSON framing.
//!
//! Every message is one line of JSON terminated by `\n`. Blank lines are
//! skipped on read.

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Read the next non-blank line as raw bytes, without the line terminator and
/// surrounding whitespace. Returns `None` at end of stream.
/// Bytes are not checked for UTF-8.
pub async fn read_frame_bytes<R>(reader: &mut R) -> std::io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Ok(None);
        }

        let trimmed = line.trim_ascii();
        if !trimmed.is_empty() {
            return Ok(Some(trimmed.to_vec()));
        }
    }
}

/// Read the next non-blank line. Returns `None` at end of stream.
pub async fn read_frame<R>(reader: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    match read_frame_bytes(reader).await? {
        Some(bytes) => String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        None => Ok(None),
    }
}

/// Serialize `message` as a single line and flush it.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let payload = serde_json::to_string(message)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    write_line(writer, &payload).await
}

/// Write an already-encoded payload followed by a newline.
pub async fn write_line<W>(writer: &mut W, payload: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(payload.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_skips_blank_lines_and_stops_at_eof() {
        let input: &[u8] = b"\n  \n{\"a\":1}\n\n{\"b\":2}";
        let mut reader = BufReader::new(input);

        assert_eq!(read_frame(&mut reader).await.unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(read_frame(&mut reader).await.unwrap().as_deref(), Some("{\"b\":2}"));
        assert_eq!(read_frame(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_frame_appends_newline() {
        let mut out = Vec::new();
        write_frame(&mut out, &json!({"ok": true})).await.unwrap();
        assert_eq!(out, b"{\"ok\":true}\n");
    }

    #[tokio::test]
    async fn test_invalid_utf8_frame_is_returned_as_bytes() {
        let input: &[u8] = b"{\"a\":\"\xff\"}\r\n{\"b\":2}\n";
        let mut reader = BufReader::new(input);

        assert_eq!(read_frame_bytes(&mut reader).await.unwrap(), Some(b"{\"a\":\"\xff\"}".to_vec()));
        assert_eq!(read_frame(&mut reader).await.unwrap().as_deref(), Some("{\"b\":2}"));
    }

    #[tokio::test]
    async fn test_read_frame_rejects_invalid_utf8() {
        let input: &[u8] = b"\xff\xfe\n";
        let mut reader = BufReader::new(input);

        let err = read_frame(&mut reader).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
