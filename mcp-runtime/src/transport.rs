use std::io;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Wire framing of a single message. Responses reuse the framing of the
/// request they answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// One JSON value per line.
    Line,
    /// `Content-Length` headers, blank line, body.
    ContentLength,
}

#[derive(Debug)]
pub enum Inbound {
    Message(Value, Framing),
    /// Frame was read in full but its body is not valid JSON.
    Malformed(String, Framing),
}

/// Upper bound on a single framed body.
pub const MAX_MESSAGE_BYTES: usize = 8 * 1024 * 1024;

/// Read the next message. `Ok(None)` means clean EOF between messages.
pub async fn read_message<R>(reader: &mut R) -> io::Result<Option<Inbound>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut line = Vec::new();
        let bytes_read = reader.read_until(b'\n', &mut line).await?;
        if bytes_read == 0 {
            return Ok(None);
        }

        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }

        if is_header_line(trimmed) {
            let header = String::from_utf8_lossy(trimmed).into_owned();
            return read_framed_body(reader, &header).await.map(Some);
        }

        return Ok(Some(match serde_json::from_slice::<Value>(trimmed) {
            Ok(value) => Inbound::Message(value, Framing::Line),
            Err(e) => Inbound::Malformed(format!("Invalid JSON payload: {e}"), Framing::Line),
        }));
    }
}

fn is_header_line(line: &[u8]) -> bool {
    const PREFIX: &[u8] = b"content-";
    line.len() >= PREFIX.len() && line[..PREFIX.len()].eq_ignore_ascii_case(PREFIX)
}

async fn read_framed_body<R>(reader: &mut R, first_header: &str) -> io::Result<Inbound>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length = parse_content_length(first_header)?;

    loop {
        let mut line = Vec::new();
        let bytes_read = reader.read_until(b'\n', &mut line).await?;
        if bytes_read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }
        let line = String::from_utf8_lossy(&line);
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        if let Some(parsed) = parse_content_length(line)? {
            content_length = Some(parsed);
        }
    }

    let content_length = content_length.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "Missing Content-Length header")
    })?;
    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;

    Ok(match serde_json::from_slice::<Value>(&payload) {
        Ok(value) => Inbound::Message(value, Framing::ContentLength),
        Err(e) => Inbound::Malformed(format!("Invalid JSON payload: {e}"), Framing::ContentLength),
    })
}

fn parse_content_length(line: &str) -> io::Result<Option<usize>> {
    let Some((name, value)) = line.split_once(':') else {
        return Ok(None);
    };
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return Ok(None);
    }
    let length = value.trim().parse::<usize>().map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidData, "Invalid Content-Length header")
    })?;
    if length > MAX_MESSAGE_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Content-Length {length} exceeds limit of {MAX_MESSAGE_BYTES} bytes"),
        ));
    }
    Ok(Some(length))
}

pub async fn write_message<W>(writer: &mut W, value: &Value, framing: Framing) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    match framing {
        Framing::Line => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
    }
    writer.flush().await
}
