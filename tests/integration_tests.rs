//! Integration tests for the chatterbox library.
//!
//! Most tests run against a one-shot HTTP server on localhost.  The live test
//! needs CHATTERBOX_BASE_URL pointing at a running backend.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chatterbox::chat::{ChatSession, ExchangeOutcome};
    use chatterbox::conversation::ERROR_MESSAGE_TEXT;
    use chatterbox::{
        ChatClient, ChatRequest, KnownModel, MemoryPreferenceStore, MessageParam, MessageRole,
        ModelSelection, PlainTextRenderer,
    };
    use futures::StreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// A canned HTTP response, written in pieces.
    struct CannedResponse {
        head: String,
        chunks: Vec<&'static [u8]>,
    }

    impl CannedResponse {
        fn streamed(chunks: &[&'static str]) -> Self {
            Self {
                head: "HTTP/1.1 200 OK\r\ncontent-type: text/plain; charset=utf-8\r\nconnection: close\r\n\r\n"
                    .to_string(),
                chunks: chunks.iter().map(|chunk| chunk.as_bytes()).collect(),
            }
        }

        fn json(status: &str, body: &'static str) -> Self {
            Self {
                head: format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                    body.len()
                ),
                chunks: vec![body.as_bytes()],
            }
        }
    }

    /// Serve exactly one request; the handle yields the raw request text.
    async fn serve_once(response: CannedResponse) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.head.as_bytes()).await.unwrap();
            for chunk in response.chunks {
                socket.write_all(chunk).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            socket.shutdown().await.unwrap();
            request
        });
        (base_url, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8(buf).unwrap()
    }

    fn request_body(request: &str) -> serde_json::Value {
        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    fn session_for(base_url: &str) -> ChatSession<ChatClient> {
        let client = ChatClient::new(Some(base_url.to_string())).unwrap();
        ChatSession::new(
            client,
            ModelSelection::load(Box::new(MemoryPreferenceStore::new())),
        )
    }

    #[tokio::test]
    async fn streams_reply_from_http_backend() {
        let (base_url, server) = serve_once(CannedResponse::streamed(&[
            "0:\"Hel\"\n",
            "0:\"lo, \\\"world\\\"\"\n",
            "2:{\"ignored\":true}\n",
        ]))
        .await;
        let session = session_for(&base_url);
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);

        let outcome = session.send("Hi", &mut renderer).await;
        let ExchangeOutcome::Completed(message) = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(message.content, "Hello, \"world\"");
        assert_eq!(message.role, MessageRole::Assistant);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/chat HTTP/1.1\r\n"), "{request}");
        assert_eq!(
            request_body(&request),
            serde_json::json!({
                "messages": [{"role": "user", "content": "Hi"}],
                "model": "ollama:llama3.2:3b"
            })
        );

        let rendered = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(rendered.contains("Hello, \"world\""));
    }

    #[tokio::test]
    async fn backend_rejection_becomes_error_message() {
        let (base_url, server) = serve_once(CannedResponse::json(
            "500 Internal Server Error",
            r#"{"error":"Failed to connect to backend"}"#,
        ))
        .await;
        let session = session_for(&base_url);
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);

        let outcome = session.send("Hi", &mut renderer).await;
        let ExchangeOutcome::Failed { message, error } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(error.status_code(), Some(500));
        assert!(error.to_string().contains("Failed to connect to backend"));
        assert!(message.is_error);
        assert_eq!(message.content, ERROR_MESSAGE_TEXT);
        assert_eq!(session.message_count(), 2);
        assert!(!session.is_loading());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_backend_fails_the_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let session = session_for(&base_url);
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        let outcome = session.send("Hi", &mut renderer).await;
        let ExchangeOutcome::Failed { error, .. } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(error.is_transport());
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn client_decodes_token_stream() {
        let (base_url, server) = serve_once(CannedResponse::streamed(&[
            "0:\"It is \"\n0:",
            "\"23\\u00b0C\"\n",
        ]))
        .await;
        let client = ChatClient::new(Some(base_url)).unwrap();
        let request = ChatRequest::new(
            vec![MessageParam::user("Weather in Tokyo?")],
            KnownModel::Gemini2_0FlashExp,
        );

        let tokens: Vec<String> = client
            .stream_tokens(&request)
            .await
            .unwrap()
            .map(|token| token.unwrap())
            .collect()
            .await;
        assert_eq!(tokens.concat(), "It is 23°C");
        let body = request_body(&server.await.unwrap());
        assert_eq!(body["model"], "gemini-2.0-flash-exp");
    }

    #[tokio::test]
    async fn health_probe() {
        let (base_url, server) = serve_once(CannedResponse::json(
            "200 OK",
            r#"{"status":"healthy","service":"ai-chatbot-backend"}"#,
        ))
        .await;
        let client = ChatClient::new(Some(base_url)).unwrap();

        let status = client.health().await.unwrap();
        assert!(status.is_healthy());
        assert_eq!(status.service.as_deref(), Some("ai-chatbot-backend"));
        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/health HTTP/1.1\r\n"), "{request}");
    }

    #[test]
    fn base_url_is_normalized() {
        let client = ChatClient::new(Some("http://localhost:8000/chat".to_string())).unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8000/chat/");
    }

    #[test]
    fn health_against_closed_port_fails() {
        let err = tokio_test::block_on(async {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());
            drop(listener);
            ChatClient::new(Some(base_url)).unwrap().health().await
        })
        .unwrap_err();
        assert!(err.is_transport(), "{err}");
    }

    #[tokio::test]
    async fn live_backend_round_trip() {
        // This test requires CHATTERBOX_BASE_URL to point at a running backend
        let base_url = std::env::var("CHATTERBOX_BASE_URL").ok();
        let Some(base_url) = base_url else {
            eprintln!("Skipping test: CHATTERBOX_BASE_URL not set");
            return;
        };

        let session = session_for(&base_url);
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        let outcome = session.send("Say 'test passed'", &mut renderer).await;
        assert!(
            outcome.message().is_some(),
            "exchange should start against a live backend"
        );
        assert!(!session.is_busy());
    }
}
