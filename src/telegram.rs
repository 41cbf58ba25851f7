//! Minimal Telegram Bot API client.
//!
//! Covers exactly the three calls the monitor needs: send a message, edit
//! a previously sent message, pin a message. Responses are classified
//! into the error taxonomy the delivery layer retries on: flood control
//! with a server-specified wait, transport failures, and everything else
//! as a permanent API rejection.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{instrument, trace};

/// Identifier of a message previously sent to the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageId(pub i64);

/// Errors produced by the messaging channel
#[derive(Debug)]
pub enum SendError {
    /// Bot API flood control; retry after the server-specified interval
    RateLimited { retry_after: Duration },

    /// Transport-level failure (connect, DNS, timeout)
    Network(String),

    /// The API rejected the request
    Api {
        code: Option<i64>,
        description: String,
    },
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::RateLimited { retry_after } => {
                write!(f, "rate limited, retry after {}s", retry_after.as_secs())
            }
            SendError::Network(msg) => write!(f, "network error: {}", msg),
            SendError::Api { code, description } => match code {
                Some(code) => write!(f, "API error {}: {}", code, description),
                None => write!(f, "API error: {}", description),
            },
        }
    }
}

impl std::error::Error for SendError {}

/// The messaging channel: send, edit in place, pin.
///
/// Implemented by [`TelegramClient`]; tests script their own
/// implementations to exercise the delivery policy without a network.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, text: &str) -> Result<MessageId, SendError>;
    async fn edit(&self, message: MessageId, text: &str) -> Result<(), SendError>;
    async fn pin(&self, message: MessageId) -> Result<(), SendError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<ApiResult>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

/// `sendMessage`/`editMessageText` answer with a Message object,
/// `pinChatMessage` with a bare `true`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiResult {
    Message { message_id: i64 },
    Flag(bool),
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(token: &str, chat_id: impl ToString) -> Self {
        Self::with_base_url(format!("https://api.telegram.org/bot{token}"), chat_id)
    }

    /// Point the client at an arbitrary API root. Tests use this to talk
    /// to a mock server instead of api.telegram.org.
    pub fn with_base_url(base_url: String, chat_id: impl ToString) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
            chat_id: chat_id.to_string(),
        }
    }

    #[instrument(skip(self, payload))]
    async fn call(&self, method: &str, payload: serde_json::Value) -> Result<ApiResponse, SendError> {
        let url = format!("{}/{}", self.base_url, method);
        trace!("calling {method}");

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SendError::Network(e.to_string()))?;

        // Bot API errors still carry a JSON body, so the body is decoded
        // regardless of the HTTP status.
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| SendError::Network(e.to_string()))?;

        if body.ok {
            return Ok(body);
        }

        if let Some(retry_after) = body.parameters.as_ref().and_then(|p| p.retry_after) {
            return Err(SendError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        Err(SendError::Api {
            code: body.error_code,
            description: body.description.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send(&self, text: &str) -> Result<MessageId, SendError> {
        let response = self
            .call(
                "sendMessage",
                json!({ "chat_id": self.chat_id, "text": text }),
            )
            .await?;

        match response.result {
            Some(ApiResult::Message { message_id }) => Ok(MessageId(message_id)),
            _ => Err(SendError::Api {
                code: None,
                description: "sendMessage response carried no message id".to_string(),
            }),
        }
    }

    async fn edit(&self, message: MessageId, text: &str) -> Result<(), SendError> {
        let result = self
            .call(
                "editMessageText",
                json!({
                    "chat_id": self.chat_id,
                    "message_id": message.0,
                    "text": text,
                }),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            // An edit that would not change anything is a success for us.
            Err(SendError::Api { description, .. })
                if description.contains("message is not modified") =>
            {
                trace!("edit was a no-op, content unchanged");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn pin(&self, message: MessageId) -> Result<(), SendError> {
        self.call(
            "pinChatMessage",
            json!({
                "chat_id": self.chat_id,
                "message_id": message.0,
                "disable_notification": true,
            }),
        )
        .await
        .map(|_| ())
    }
}
