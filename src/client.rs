use std::env;
use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::header::{self, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{TRANSPORT_ERRORS, TRANSPORT_HEADERS_DURATION, TRANSPORT_REQUESTS};
use crate::token_stream::{ByteStream, TokenStream, decode_tokens};
use crate::types::{ChatRequest, HealthStatus};

const DEFAULT_BASE_URL: &str = "http://localhost:8000/";
const BASE_URL_ENV: &str = "CHATTERBOX_BASE_URL";
const CHAT_PATH: &str = "api/chat";
const HEALTH_PATH: &str = "api/health";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can carry a chat request to a backend and hand back the raw reply body.
///
/// Implementations perform exactly one request per call and never retry; retrying an
/// exchange is the caller's decision.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the streamed body once the response headers arrive.
    ///
    /// A non-success status is an error.
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream>;
}

/// HTTP client for the chat backend.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    base_url: Url,
    connect_timeout: Duration,
}

impl ChatClient {
    /// Create a new client.
    ///
    /// The base URL can be provided directly or read from the CHATTERBOX_BASE_URL
    /// environment variable, falling back to a backend on localhost.
    pub fn new(base_url: Option<String>) -> Result<Self> {
        Self::with_options(base_url, None)
    }

    /// Create a new client with custom settings.
    ///
    /// `connect_timeout` bounds connection establishment only; a reply may stream for
    /// as long as the backend keeps producing it.
    pub fn with_options(base_url: Option<String>, connect_timeout: Option<Duration>) -> Result<Self> {
        let base_url = match base_url {
            Some(url) => url,
            None => env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        };
        let base_url = parse_base_url(&base_url)?;

        let connect_timeout = connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            connect_timeout,
        })
    }

    /// The backend this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.connect_timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Process an error response and convert it to our Error type.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        match response.text().await {
            Ok(body) => error_from_body(status_code, &body),
            Err(e) => Error::http_client(
                format!("Failed to read error response: {e}"),
                Some(Box::new(e)),
            ),
        }
    }

    /// Probe the backend's health endpoint.
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self.endpoint(HEALTH_PATH)?;
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        response.json::<HealthStatus>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse health response: {e}"),
                Some(Box::new(e)),
            )
        })
    }

    /// Send a request and decode the reply into text fragments.
    pub async fn stream_tokens(&self, request: &ChatRequest) -> Result<TokenStream> {
        let body = self.open(request).await?;
        Ok(decode_tokens(body))
    }
}

#[async_trait::async_trait]
impl Transport for ChatClient {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream> {
        let url = self.endpoint(CHAT_PATH)?;
        TRANSPORT_REQUESTS.click();
        tracing::debug!(
            url = %url,
            messages = request.messages.len(),
            model = ?request.model,
            "posting chat request"
        );

        let start = Instant::now();
        let response = self
            .client
            .post(url)
            .header(
                header::ACCEPT,
                HeaderValue::from_static("text/event-stream"),
            )
            .json(request)
            .send()
            .await
            .map_err(|e| {
                TRANSPORT_ERRORS.click();
                self.map_send_error(e)
            })?;
        TRANSPORT_HEADERS_DURATION.add(start.elapsed().as_secs_f64());

        if !response.status().is_success() {
            TRANSPORT_ERRORS.click();
            let err = Self::process_error_response(response).await;
            tracing::warn!(error = %err, "chat request rejected");
            return Err(err);
        }

        let stream = response.bytes_stream().map(|result| {
            result.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
            })
        });
        Ok(Box::pin(stream))
    }
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    if url.cannot_be_a_base() {
        return Err(Error::validation(
            format!("{base_url} cannot be used as a base URL"),
            Some("base_url".to_string()),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Build an error for a non-success reply.
///
/// The Next.js proxy answers `{"error": "..."}`, FastAPI answers `{"detail": "..."}`;
/// anything else is reported verbatim.
fn error_from_body(status_code: u16, body: &str) -> Error {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|value| {
            value
                .get("error")
                .or_else(|| value.get("detail"))
                .or_else(|| value.get("message"))
        })
        .and_then(|field| match field {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(obj) => obj
                .get("message")
                .and_then(|m| m.as_str())
                .map(String::from),
            _ => None,
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "Failed to get response".to_string()
            } else {
                body.trim().to_string()
            }
        });
    Error::api(status_code, message)
}
