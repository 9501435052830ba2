//! Service API Client
//!
//! HTTP client for the assistance service: unary JSON calls (completions,
//! heartbeat, registration) and the streaming chat call whose chunked
//! response body carries length-prefixed frames.
//!
//! Unary calls ride a client with a hard total timeout. The chat stream
//! uses a second client without one, since a healthy stream can legitimately
//! run for minutes; staleness is caught per-chunk by the caller.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::completion::{self, CompletionItem, DocumentSnapshot};
use crate::protocol::{
    ChatRequest, ChatTurn, CompletionRequest, CompletionResponse, HeartbeatRequest,
    RegisterUserRequest, RegisterUserResponse, RequestMetadata,
};
use crate::transport::frame;

/// Completions endpoint path
pub const COMPLETIONS_PATH: &str = "/assist.language_server_pb.LanguageServerService/GetCompletions";
/// Heartbeat endpoint path
pub const HEARTBEAT_PATH: &str = "/assist.language_server_pb.LanguageServerService/Heartbeat";
/// Chat endpoint path; the response body is a frame stream
pub const CHAT_PATH: &str = "/assist.language_server_pb.LanguageServerService/GetChatMessage";
/// Registration endpoint path, served by the API server rather than the bridge
pub const REGISTER_USER_PATH: &str = "/assist.api_server_pb.ApiServerService/RegisterUser";

/// How long to wait for the chat response headers
const CHAT_HEADER_TIMEOUT: Duration = Duration::from_secs(8);

/// Errors from service calls
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The call exceeded its deadline
    #[error("request timed out")]
    Timeout,

    /// Transport-level HTTP failure
    #[error("http request failed: {0}")]
    Http(String),

    /// The service answered with a non-success status
    #[error("service returned status {0}")]
    Status(u16),

    /// The response body did not parse
    #[error("response failed to decode: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

/// Issues completion requests
///
/// The host orchestrator is generic over this so tests can substitute a
/// scripted backend for the live service.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Fetch completions for a document snapshot
    async fn completions(
        &self,
        snapshot: &DocumentSnapshot,
    ) -> Result<Vec<CompletionItem>, ApiError>;
}

/// Client for one service endpoint
#[derive(Clone)]
pub struct ApiClient {
    /// Unary calls, bounded by a total timeout
    unary: reqwest::Client,
    /// Chat stream, unbounded; the caller enforces per-chunk deadlines
    streaming: reqwest::Client,
    base_url: String,
    metadata: RequestMetadata,
}

impl ApiClient {
    /// Build a client for `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] when the underlying HTTP clients cannot
    /// be constructed.
    pub fn new(
        base_url: impl Into<String>,
        metadata: RequestMetadata,
        unary_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let unary = reqwest::Client::builder()
            .timeout(unary_timeout)
            .build()
            .map_err(|e| ApiError::Http(e.to_string()))?;
        let streaming = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiError::Http(e.to_string()))?;

        Ok(Self {
            unary,
            streaming,
            base_url: base_url.into(),
            metadata,
        })
    }

    /// The metadata attached to every request
    #[must_use]
    pub fn metadata(&self) -> &RequestMetadata {
        &self.metadata
    }

    async fn unary_call<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, ApiError> {
        let url = format!("{}{path}", self.base_url);
        let response = self.unary.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }

    /// Exchange an auth token for an API key
    ///
    /// # Errors
    ///
    /// Fails on transport errors or when the service withholds a key.
    pub async fn register_user(&self, auth_token: &str) -> Result<String, ApiError> {
        let request = RegisterUserRequest {
            firebase_id_token: auth_token.to_string(),
        };
        let response: RegisterUserResponse = self.unary_call(REGISTER_USER_PATH, &request).await?;
        response
            .api_key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ApiError::Decode("registration returned no api key".to_string()))
    }

    /// Tell the service this client is still alive
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors; callers typically log and
    /// carry on.
    pub async fn heartbeat(&self) -> Result<(), ApiError> {
        let request = HeartbeatRequest {
            metadata: self.metadata.clone(),
        };
        let url = format!("{}{HEARTBEAT_PATH}", self.base_url);
        let response = self.unary.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        // Only the status matters; some deployments answer with an empty
        // body.
        let _ = response.bytes().await;
        Ok(())
    }

    /// Fetch raw completions for a request
    ///
    /// # Errors
    ///
    /// Fails on transport errors, non-success statuses, or an unparsable
    /// body.
    pub async fn get_completions(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ApiError> {
        self.unary_call(COMPLETIONS_PATH, request).await
    }

    /// Open the chat stream for one exchange
    ///
    /// The request is serialized to JSON and sent as a single frame; the
    /// returned stream yields raw response-body chunks for a
    /// [`crate::chat::ChatStreamSession`] to consume. Header arrival is
    /// bounded; the body is not.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Timeout`] when the response headers do not
    /// arrive in time, and transport or status errors otherwise.
    pub async fn open_chat_stream(
        &self,
        prompt: &str,
        conversation_id: &str,
        history: Vec<ChatTurn>,
    ) -> Result<impl Stream<Item = Result<Bytes, reqwest::Error>>, ApiError> {
        let request = ChatRequest {
            metadata: self.metadata.clone(),
            prompt: prompt.to_string(),
            conversation_id: conversation_id.to_string(),
            message_history: history,
        };
        let payload =
            serde_json::to_vec(&request).map_err(|e| ApiError::Decode(e.to_string()))?;
        let body = frame::encode(&payload).map_err(|e| ApiError::Http(e.to_string()))?;

        let url = format!("{}{CHAT_PATH}", self.base_url);
        let send = self
            .streaming
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/connect+json")
            .body(body)
            .send();

        let response = tokio::time::timeout(CHAT_HEADER_TIMEOUT, send)
            .await
            .map_err(|_| ApiError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        tracing::debug!(conversation_id, "chat stream opened");
        Ok(response.bytes_stream())
    }
}

#[async_trait]
impl CompletionBackend for ApiClient {
    async fn completions(
        &self,
        snapshot: &DocumentSnapshot,
    ) -> Result<Vec<CompletionItem>, ApiError> {
        let request = CompletionRequest {
            metadata: self.metadata.clone(),
            document: snapshot.document_state(),
            editor_options: snapshot.editor_options(),
        };
        let response = self.get_completions(&request).await?;
        Ok(completion::normalize(response.completion_items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn metadata() -> RequestMetadata {
        RequestMetadata {
            api_key: "key".into(),
            ide_name: "vscode".into(),
            ide_version: "1.77.3".into(),
            extension_version: "1.2.15".into(),
        }
    }

    #[test]
    fn test_client_builds() {
        let client = ApiClient::new(
            "http://localhost:42100",
            metadata(),
            Duration::from_secs(4),
        );
        assert!(client.is_ok());
    }

    /// Serve exactly one request with a canned response.
    async fn serve_once(listener: tokio::net::TcpListener, response: &'static [u8]) {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if request_complete(&buf) {
                break;
            }
        }
        socket.write_all(response).await.unwrap();
    }

    fn request_complete(buf: &[u8]) -> bool {
        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]);
        let length = headers
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        buf.len() >= header_end + 4 + length
    }

    #[tokio::test]
    async fn test_heartbeat_tolerates_empty_body() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(
            listener,
            b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n",
        ));

        let client = ApiClient::new(
            format!("http://{addr}"),
            metadata(),
            Duration::from_secs(2),
        )
        .unwrap();
        client.heartbeat().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_heartbeat_surfaces_error_status() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(
            listener,
            b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\n\r\n",
        ));

        let client = ApiClient::new(
            format!("http://{addr}"),
            metadata(),
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(matches!(
            client.heartbeat().await,
            Err(ApiError::Status(503))
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unary_call_against_dead_port_is_http_error() {
        // Port 1 is reserved and never listening.
        let client =
            ApiClient::new("http://127.0.0.1:1", metadata(), Duration::from_millis(200)).unwrap();
        let result = client.heartbeat().await;
        assert!(matches!(
            result,
            Err(ApiError::Http(_) | ApiError::Timeout)
        ));
    }
}
