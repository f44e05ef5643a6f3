//! Decoding of the chat backend's newline-delimited token stream.
//!
//! The backend answers `POST /api/chat` with a body of lines.  A line that starts
//! with `0:` carries one fragment of assistant text, JSON-quoted; every other line
//! is ignored.  There is no terminating sentinel: the reply is complete when the
//! body ends.

use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use tokio_util::codec::Decoder;

use crate::error::{Error, Result};
use crate::observability::{STREAM_BYTES, STREAM_ERRORS, STREAM_IGNORED_LINES, STREAM_TOKENS};

/// Prefix of a line carrying assistant text.
pub const TEXT_TOKEN_MARKER: &str = "0:";

/// A boxed stream of raw body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A boxed stream of decoded text fragments.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Splits a byte buffer into lines.
///
/// Splitting happens on `\n` before any UTF-8 decoding, so a multi-byte character
/// that straddles two chunks is reassembled before it is decoded.  A trailing `\r`
/// is dropped and invalid UTF-8 is replaced rather than rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineCodec;

impl LineCodec {
    fn to_line(bytes: &[u8]) -> String {
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        String::from_utf8_lossy(bytes).into_owned()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        let Some(newline) = src.iter().position(|b| *b == b'\n') else {
            return Ok(None);
        };
        let line = src.split_to(newline + 1);
        Ok(Some(Self::to_line(&line[..newline])))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let rest = src.split();
        Ok(Some(Self::to_line(&rest)))
    }
}

/// Extract the text fragment from one protocol line.
///
/// Returns `None` for lines that do not carry text.  The payload is unescaped when
/// it is a well-formed JSON string; otherwise one pair of surrounding quotes is
/// removed, and a bare payload is taken as-is.
pub fn parse_token_line(line: &str) -> Option<String> {
    let payload = line.strip_prefix(TEXT_TOKEN_MARKER)?;
    Some(unquote(payload))
}

fn unquote(payload: &str) -> String {
    if payload.len() >= 2 && payload.starts_with('"') && payload.ends_with('"') {
        match serde_json::from_str::<String>(payload) {
            Ok(text) => text,
            Err(_) => payload[1..payload.len() - 1].to_string(),
        }
    } else {
        payload.to_string()
    }
}

/// Render a fragment of text as one protocol line, newline included.
pub fn encode_token(text: &str) -> String {
    let quoted = serde_json::Value::String(text.to_string());
    format!("{TEXT_TOKEN_MARKER}{quoted}\n")
}

struct DecoderState<S> {
    inner: S,
    buffer: BytesMut,
    codec: LineCodec,
    exhausted: bool,
}

/// Turn a stream of body chunks into a stream of text fragments.
///
/// The returned stream is lazy and ends when `byte_stream` ends.  An error from
/// `byte_stream` is yielded once and ends the stream; buffered partial input is
/// discarded at that point.
pub fn decode_tokens<S>(byte_stream: S) -> TokenStream
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin + 'static,
{
    let state = DecoderState {
        inner: byte_stream,
        buffer: BytesMut::new(),
        codec: LineCodec,
        exhausted: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            let frame = if state.exhausted {
                state.codec.decode_eof(&mut state.buffer)
            } else {
                state.codec.decode(&mut state.buffer)
            };
            match frame {
                Ok(Some(line)) => match parse_token_line(&line) {
                    Some(token) => {
                        STREAM_TOKENS.click();
                        return Some((Ok(token), state));
                    }
                    None => {
                        STREAM_IGNORED_LINES.click();
                        tracing::trace!(line = %line, "ignoring non-token line");
                        continue;
                    }
                },
                Ok(None) if state.exhausted => return None,
                Ok(None) => {}
                Err(err) => {
                    STREAM_ERRORS.click();
                    state.exhausted = true;
                    state.buffer.clear();
                    return Some((Err(err), state));
                }
            }

            match state.inner.next().await {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    state.buffer.extend_from_slice(&bytes);
                }
                Some(Err(err)) => {
                    STREAM_ERRORS.click();
                    tracing::debug!(error = %err, "byte stream failed mid-reply");
                    state.exhausted = true;
                    state.buffer.clear();
                    return Some((Err(err), state));
                }
                None => {
                    state.exhausted = true;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Bytes>> + Send + Unpin + 'static {
        let parts: Vec<Result<Bytes>> = parts
            .iter()
            .map(|part| Ok(Bytes::copy_from_slice(part)))
            .collect();
        stream::iter(parts)
    }

    async fn collect_text(parts: &[&[u8]]) -> String {
        let tokens: Vec<String> = decode_tokens(chunks(parts))
            .map(|token| token.unwrap())
            .collect()
            .await;
        tokens.concat()
    }

    #[tokio::test]
    async fn assembles_quoted_tokens() {
        let text = collect_text(&[b"0:\"Hel\"\n", b"0:\"lo\"\n"]).await;
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn yields_one_fragment_per_line() {
        let tokens: Vec<String> = decode_tokens(chunks(&[b"0:\"a\"\n0:\"b\"\n0:\"c\"\n"]))
            .map(|token| token.unwrap())
            .collect()
            .await;
        assert_eq!(tokens, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn ignores_lines_without_marker() {
        let text = collect_text(&[
            b"event: ping\n",
            b"1:{\"tool\":\"calculator\"}\n",
            b"0:\"925\"\n",
            b"\n",
            b"data: 0:\"nope\"\n",
        ])
        .await;
        assert_eq!(text, "925");
    }

    #[tokio::test]
    async fn reassembles_lines_split_across_chunks() {
        let text = collect_text(&[b"0:\"It is 2", b"3 degrees\"\n0:", b"\" in Tokyo\"\n"]).await;
        assert_eq!(text, "It is 23 degrees in Tokyo");
    }

    #[tokio::test]
    async fn reassembles_multibyte_characters_split_across_chunks() {
        let line = "0:\"東京\"\n".as_bytes();
        // Split inside the three-byte encoding of the first character.
        let (first, second) = line.split_at(4);
        let text = collect_text(&[first, second]).await;
        assert_eq!(text, "東京");
    }

    #[tokio::test]
    async fn processes_trailing_line_without_newline() {
        let text = collect_text(&[b"0:\"one\"\n0:\"two\""]).await;
        assert_eq!(text, "onetwo");
    }

    #[tokio::test]
    async fn unescapes_json_payloads() {
        let text = collect_text(&[b"0:\"line one\\nline \\\"two\\\"\"\n"]).await;
        assert_eq!(text, "line one\nline \"two\"");
    }

    #[test]
    fn accepts_unquoted_and_malformed_payloads() {
        assert_eq!(parse_token_line("0:plain text"), Some("plain text".to_string()));
        assert_eq!(parse_token_line("0:\"bad \\q\""), Some("bad \\q".to_string()));
        assert_eq!(parse_token_line("0:\""), Some("\"".to_string()));
        assert_eq!(parse_token_line("0:"), Some(String::new()));
        assert_eq!(parse_token_line("2:\"x\""), None);
    }

    #[tokio::test]
    async fn strips_carriage_returns() {
        let text = collect_text(&[b"0:\"crlf\"\r\n"]).await;
        assert_eq!(text, "crlf");
    }

    #[tokio::test]
    async fn empty_body_yields_nothing() {
        let mut tokens = decode_tokens(chunks(&[]));
        assert!(tokens.next().await.is_none());
    }

    #[tokio::test]
    async fn byte_stream_error_is_yielded_then_stream_ends() {
        let parts: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"0:\"partial\"\n0:\"lost")),
            Err(Error::streaming("connection reset", None)),
            Ok(Bytes::from_static(b"0:\"never\"\n")),
        ];
        let mut tokens = decode_tokens(stream::iter(parts));

        assert_eq!(tokens.next().await.unwrap().unwrap(), "partial");
        assert!(tokens.next().await.unwrap().is_err());
        assert!(tokens.next().await.is_none());
    }

    #[test]
    fn encode_token_produces_a_decodable_line() {
        let line = encode_token("say \"hi\"\n");
        assert_eq!(line, "0:\"say \\\"hi\\\"\\n\"\n");
        assert_eq!(
            parse_token_line(line.trim_end_matches('\n')),
            Some("say \"hi\"\n".to_string())
        );
    }

    #[test]
    fn codec_holds_partial_lines() {
        let mut codec = LineCodec;
        let mut buffer = BytesMut::from(&b"0:\"a\"\n0:\"b"[..]);
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some("0:\"a\"".to_string()));
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
        assert_eq!(
            codec.decode_eof(&mut buffer).unwrap(),
            Some("0:\"b".to_string())
        );
        assert_eq!(codec.decode_eof(&mut buffer).unwrap(), None);
    }
}
