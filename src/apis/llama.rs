use std::{fmt, io, mem};

use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use url::Url;

/// Llama's native request structure.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub prompt: String,
    pub max_gen_len: u16,
    pub temperature: f32,
}

/// One decoded element of the response stream. Chunks without a `generation`
/// field carry metadata only.
#[derive(Debug, Default, Deserialize)]
pub struct ChunkResponse {
    pub generation: Option<String>,
    pub stop_reason: Option<String>,
    pub generation_token_count: Option<u32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug)]
pub enum InvocationError {
    Network(reqwest::Error),
    Server(StatusCode),
    Api(String),
    Decode(serde_json::Error),
    Write(io::Error),
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(err) => write!(f, "network error: {err}"),
            Self::Server(status) => write!(f, "server returned {status}"),
            Self::Api(message) => write!(f, "service error: {message}"),
            Self::Decode(err) => write!(f, "malformed response chunk: {err}"),
            Self::Write(err) => write!(f, "cannot write output: {err}"),
        }
    }
}

impl From<reqwest::Error> for InvocationError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err)
    }
}

impl From<io::Error> for InvocationError {
    fn from(err: io::Error) -> Self {
        Self::Write(err)
    }
}

/// Invokes the model and forwards decoded chunks into `tx` as they arrive.
/// Any failure, before or during streaming, is sent as a single terminal
/// error; the channel closing marks the end of the stream.
pub async fn invoke_with_response_stream(
    http_client: reqwest::Client,
    tx: mpsc::UnboundedSender<Result<ChunkResponse, InvocationError>>,
    endpoint: &Url,
    api_key: Option<&str>,
    model: &str,
    request: &InvokeRequest,
) {
    let url = format!(
        "{}/model/{model}/invoke-with-response-stream",
        endpoint.as_str().trim_end_matches('/')
    );

    let mut builder = http_client.post(url).json(request);

    if let Some(api_key) = api_key {
        builder = builder.bearer_auth(api_key);
    }

    let response = match builder.send().await {
        Ok(response) => response,
        Err(err) => {
            tx.send(Err(InvocationError::Network(err))).ok();
            return;
        }
    };

    let status = response.status();

    if status.is_server_error()
        && response.headers().get(CONTENT_TYPE).is_some_and(|header| {
            header.to_str().is_ok_and(|header| header.starts_with("text/html"))
        })
    {
        tx.send(Err(InvocationError::Server(status))).ok();
        return;
    }

    if status != StatusCode::OK {
        let error = match response.json::<ErrorResponse>().await {
            Ok(error_response) => InvocationError::Api(error_response.message),
            Err(err) => InvocationError::Network(err),
        };

        tx.send(Err(error)).ok();
        return;
    }

    let mut buffer = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(part) = stream.next().await {
        let part = match part {
            Ok(part) => part,
            Err(err) => {
                tx.send(Err(InvocationError::Network(err))).ok();
                return;
            }
        };

        buffer.extend(&part);

        while let Some(line) = take_line(&mut buffer) {
            let chunk = decode_chunk(&line);
            let failed = chunk.is_err();

            if tx.send(chunk).is_err() || failed {
                return;
            }
        }
    }

    if !buffer.iter().all(u8::is_ascii_whitespace) {
        tx.send(decode_chunk(&buffer)).ok();
    }
}

/// Removes the next complete line from `buffer`. Network frames do not align
/// with lines, so incomplete trailing data stays buffered until the rest
/// arrives. Blank lines are skipped.
fn take_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    loop {
        let index = buffer.iter().position(|&byte| byte == b'\n')?;
        let rest = buffer.split_off(index + 1);
        let mut line = mem::replace(buffer, rest);
        line.pop();

        if line.last() == Some(&b'\r') {
            line.pop();
        }

        if !line.is_empty() {
            return Some(line);
        }
    }
}

fn decode_chunk(payload: &[u8]) -> Result<ChunkResponse, InvocationError> {
    serde_json::from_slice(payload).map_err(InvocationError::Decode)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request_round_trips() {
        let request = InvokeRequest {
            prompt: "how can i improve my models performance ".into(),
            max_gen_len: 512,
            temperature: 0.5,
        };

        let encoded = serde_json::to_string(&request).unwrap();
        let decoded = serde_json::from_str::<InvokeRequest>(&encoded).unwrap();

        assert_eq!(decoded, request);
    }

    #[test]
    fn chunk_fields_are_optional() {
        let chunk = decode_chunk(b"{}").unwrap();
        assert_eq!(chunk.generation, None);
        assert_eq!(chunk.stop_reason, None);

        let chunk = decode_chunk(
            br#"{"generation":"Hello","stop_reason":"stop","generation_token_count":2}"#,
        )
        .unwrap();
        assert_eq!(chunk.generation.as_deref(), Some("Hello"));
        assert_eq!(chunk.stop_reason.as_deref(), Some("stop"));
        assert_eq!(chunk.generation_token_count, Some(2));
    }

    #[test]
    fn malformed_chunk_is_an_error() {
        let err = decode_chunk(b"{\"generation\":").unwrap_err();
        assert!(matches!(err, InvocationError::Decode(_)));
    }

    #[test]
    fn take_line_reassembles_split_frames() {
        let mut buffer = Vec::new();

        buffer.extend_from_slice(b"{\"generation\":\"He");
        assert_eq!(take_line(&mut buffer), None);

        buffer.extend_from_slice(b"llo\"}\r\n{}\n{\"generation");
        assert_eq!(take_line(&mut buffer).as_deref(), Some(b"{\"generation\":\"Hello\"}".as_slice()));
        assert_eq!(take_line(&mut buffer).as_deref(), Some(b"{}".as_slice()));
        assert_eq!(take_line(&mut buffer), None);
        assert_eq!(buffer, b"{\"generation\"".to_vec());
    }

    #[test]
    fn take_line_skips_blank_lines() {
        let mut buffer = b"\n\r\n{}\n".to_vec();
        assert_eq!(take_line(&mut buffer).as_deref(), Some(b"{}".as_slice()));
        assert_eq!(take_line(&mut buffer), None);
        assert!(buffer.is_empty());
    }
}
