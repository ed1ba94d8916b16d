//! Message framing for the LSP base protocol.
//!
//! Headers are ASCII `Key: Value` lines separated by `\r\n` and terminated
//! by a blank line; only `Content-Length` is honored (`Content-Type` is read
//! and ignored). The body is UTF-8 JSON of exactly `Content-Length` bytes.

use std::io::{self, BufRead, Write};

use serde_json::Value;
use zls_protocol::{JsonRpcRequest, JsonRpcResponse};

/// One framing-layer read.
#[derive(Debug)]
pub enum ReadOutcome {
    /// A parsed request or notification.
    Message(JsonRpcRequest),
    /// A frame whose body was not valid JSON-RPC; skip it and keep reading.
    Malformed,
    /// Standard input closed or the header block was unreadable.
    Eof,
}

/// Read one framed message from the reader.
pub fn read_message<R: BufRead>(reader: &mut R) -> io::Result<ReadOutcome> {
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(ReadOutcome::Eof);
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        match line.split_once(": ") {
            Some(("Content-Length", value)) => match value.parse::<usize>() {
                Ok(length) => content_length = Some(length),
                Err(_) => return Ok(ReadOutcome::Eof),
            },
            Some(("Content-Type", _)) => {}
            Some(_) => {}
            None => return Ok(ReadOutcome::Eof),
        }
    }

    let Some(length) = content_length else {
        return Ok(ReadOutcome::Eof);
    };

    let mut body = vec![0u8; length];
    if reader.read_exact(&mut body).is_err() {
        return Ok(ReadOutcome::Eof);
    }

    match serde_json::from_slice(&body) {
        Ok(request) => Ok(ReadOutcome::Message(request)),
        Err(err) => {
            eprintln!("[zls:rx] malformed frame: {err}");
            Ok(ReadOutcome::Malformed)
        }
    }
}

/// Write a response with `Content-Length` framing.
pub fn write_message<W: Write>(writer: &mut W, response: &JsonRpcResponse) -> io::Result<()> {
    let content = serde_json::to_string(response)?;
    write!(writer, "Content-Length: {}\r\n\r\n{}", content.len(), content)?;
    writer.flush()
}

/// Write a server→client notification with `Content-Length` framing.
pub fn write_notification<W: Write>(writer: &mut W, method: &str, params: Value) -> io::Result<()> {
    let notification = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
    });
    let content = notification.to_string();
    write!(writer, "Content-Length: {}\r\n\r\n{}", content.len(), content)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::BufReader;

    fn frame(body: &str) -> Vec<u8> {
        format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes()
    }

    #[test]
    fn reads_a_framed_request() {
        let bytes = frame(r#"{"jsonrpc":"2.0","id":1,"method":"shutdown"}"#);
        let mut reader = BufReader::new(bytes.as_slice());
        match read_message(&mut reader).unwrap() {
            ReadOutcome::Message(req) => {
                assert_eq!(req.method, "shutdown");
                assert_eq!(req.id, Some(json!(1)));
            }
            other => panic!("expected message, got {other:?}"),
        }
        assert!(matches!(read_message(&mut reader).unwrap(), ReadOutcome::Eof));
    }

    #[test]
    fn content_type_header_is_ignored() {
        let body = r#"{"jsonrpc":"2.0","method":"initialized"}"#;
        let bytes = format!(
            "Content-Type: application/vscode-jsonrpc; charset=utf-8\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let mut reader = BufReader::new(bytes.as_bytes());
        assert!(matches!(read_message(&mut reader).unwrap(), ReadOutcome::Message(_)));
    }

    #[test]
    fn malformed_body_is_skipped_not_fatal() {
        let mut bytes = frame("{not json");
        bytes.extend_from_slice(&frame(r#"{"jsonrpc":"2.0","method":"initialized"}"#));
        let mut reader = BufReader::new(bytes.as_slice());
        assert!(matches!(read_message(&mut reader).unwrap(), ReadOutcome::Malformed));
        assert!(matches!(read_message(&mut reader).unwrap(), ReadOutcome::Message(_)));
    }

    #[test]
    fn missing_content_length_is_fatal() {
        let bytes = b"X-Other: 1\r\n\r\n{}".to_vec();
        let mut reader = BufReader::new(bytes.as_slice());
        assert!(matches!(read_message(&mut reader).unwrap(), ReadOutcome::Eof));
    }

    #[test]
    fn write_round_trip() {
        let mut out = Vec::new();
        write_message(&mut out, &JsonRpcResponse::null(Some(json!(3)))).unwrap();
        let text = String::from_utf8(out).unwrap();
        let body = r#"{"jsonrpc":"2.0","id":3,"result":null}"#;
        assert_eq!(text, format!("Content-Length: {}\r\n\r\n{}", body.len(), body));
    }
}
