//! Stdio transport for JSON-RPC.
//!
//! Two wire formats are accepted on input and detected per message:
//! newline-delimited JSON (the MCP stdio transport) and `Content-Length`
//! headed frames (LSP style). A reply goes out in the format its request
//! arrived in.

use std::io::{Error, ErrorKind};

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound for one message, whichever framing carries it.
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// One JSON value per line.
    Line,
    /// `Content-Length: n` headers, a blank line, then `n` bytes of JSON.
    ContentLength,
}

/// Next message from `reader`, or `None` at a clean end of input.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<(Value, Framing)>, Error>
where
    R: AsyncBufRead + Unpin,
{
    let first = loop {
        let Some(line) = next_line(reader).await? else {
            return Ok(None);
        };
        if !line.trim().is_empty() {
            break line;
        }
    };

    let trimmed = first.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        let message = parse_json(trimmed.trim_end().as_bytes())?;
        return Ok(Some((message, Framing::Line)));
    }

    let mut declared = content_length_of(&first)?;
    loop {
        let line = next_line(reader).await?.ok_or_else(|| {
            Error::new(ErrorKind::UnexpectedEof, "input ended inside message headers")
        })?;
        if line.trim().is_empty() {
            break;
        }
        if let Some(length) = content_length_of(&line)? {
            declared = Some(length);
        }
    }

    let length = declared
        .ok_or_else(|| Error::new(ErrorKind::InvalidData, "message headers lack Content-Length"))?;
    if length > MAX_MESSAGE_BYTES {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("Content-Length {length} exceeds the {MAX_MESSAGE_BYTES} byte limit"),
        ));
    }
    let mut body = vec![0_u8; length];
    reader.read_exact(&mut body).await?;
    Ok(Some((parse_json(&body)?, Framing::ContentLength)))
}

pub async fn write_message<W>(writer: &mut W, value: &Value, framing: Framing) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value)
        .map_err(|e| Error::new(ErrorKind::InvalidData, format!("unserializable reply: {e}")))?;
    match framing {
        Framing::Line => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
        Framing::ContentLength => {
            let header = format!("Content-Length: {}\r\n\r\n", body.len());
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
    }
    writer.flush().await
}

/// One line including its terminator, refusing lines past the size limit.
async fn next_line<R>(reader: &mut R) -> Result<Option<String>, Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let limit = MAX_MESSAGE_BYTES as u64 + 1;
    let read = (&mut *reader).take(limit).read_line(&mut line).await?;
    if read == 0 {
        return Ok(None);
    }
    if read > MAX_MESSAGE_BYTES {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("line exceeds the {MAX_MESSAGE_BYTES} byte limit"),
        ));
    }
    Ok(Some(line))
}

/// `Some(n)` for a Content-Length header, `None` for any other header.
fn content_length_of(line: &str) -> Result<Option<usize>, Error> {
    let Some((name, value)) = line.split_once(':') else {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("neither JSON nor a header: {}", line.trim()),
        ));
    };
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return Ok(None);
    }
    value
        .trim()
        .parse::<usize>()
        .map(Some)
        .map_err(|_| Error::new(ErrorKind::InvalidData, "Content-Length is not a number"))
}

fn parse_json(bytes: &[u8]) -> Result<Value, Error> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::new(ErrorKind::InvalidData, format!("invalid JSON message: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn newline_delimited_messages_are_read_one_per_line() {
        let input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\",\"params\":{}}\n\n\
                      {\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n";
        let mut reader = BufReader::new(&input[..]);

        let (first, framing) = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(framing, Framing::Line);
        assert_eq!(first["method"], "initialize");

        let (second, _) = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(second["method"], "notifications/initialized");
        assert!(read_message(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn final_line_without_newline_is_still_a_message() {
        let mut reader = BufReader::new(&b"[{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}]"[..]);
        let (batch, framing) = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(framing, Framing::Line);
        assert_eq!(batch[0]["id"], 2);
    }

    #[tokio::test]
    async fn line_replies_are_single_line_json() {
        let mut out = Vec::new();
        write_message(&mut out, &json!({ "id": 1, "result": { "text": "a\nb" } }), Framing::Line)
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 1);
    }

    #[tokio::test]
    async fn content_length_frames_round_trip() {
        let mut buffer = Vec::new();
        write_message(&mut buffer, &json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" }), Framing::ContentLength)
            .await
            .unwrap();

        let mut reader = BufReader::new(buffer.as_slice());
        let (message, framing) = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(framing, Framing::ContentLength);
        assert_eq!(message["method"], "ping");
        assert!(read_message(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn extra_headers_are_ignored() {
        let body = r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#;
        let input = format!(
            "Content-Type: application/json\r\ncontent-length: {}\r\n\r\n{body}",
            body.len()
        );
        let mut reader = BufReader::new(input.as_bytes());
        let (message, _) = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(message["id"], 3);
    }

    #[tokio::test]
    async fn oversized_content_length_is_refused_before_allocating() {
        let mut reader = BufReader::new(&b"Content-Length: 99999999999\r\n\r\n{}"[..]);
        let err = read_message(&mut reader).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn garbage_line_is_invalid_data() {
        let mut reader = BufReader::new(&b"hello there\n"[..]);
        let err = read_message(&mut reader).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
