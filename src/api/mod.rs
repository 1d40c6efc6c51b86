//! OpenAI-compatible streaming chat client.
//!
//! One [`ChatClient::respond`] call is one turn: build the request payload,
//! POST it, decode the SSE body into display deltas / tool calls / usage,
//! and append the finalized assistant message to the conversation. The whole
//! turn runs inside a conversation transaction, so any failure rolls back
//! every message the turn appended — including the user message.

pub mod accumulator;
pub mod sse;

use crate::config::{Config, SecretString};
use crate::error::ApiError;
use self::sse::StreamDecoder;
use crate::textutil::truncate_with_suffix_by_bytes;
use crate::types::{Conversation, Message, ToolDefinition, Usage};
use async_trait::async_trait;
use serde_json::json;
use std::io::Write;
use std::time::Duration;

pub use sse::StreamOutcome;

/// Endpoint path appended to the configured base URL.
const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
/// Outbound payload cap; a conversation this large has gone wrong upstream.
const MAX_PAYLOAD_BYTES: usize = 4 * 1024 * 1024;
/// Error bodies shown to the user are cut at 2 KiB.
const MAX_ERROR_BODY_BYTES: usize = 2 * 1024;
/// Floor / ceiling for the adaptive socket timeout.
const MIN_SOCKET_TIMEOUT: Duration = Duration::from_millis(750);
const MAX_SOCKET_TIMEOUT: Duration = Duration::from_secs(20);
/// Per-respond retry budget, counting the initial attempt.
const MAX_ATTEMPTS: u32 = 2;

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

/// Reply from one POST attempt, before any SSE decoding.
pub enum TransportReply {
    /// 2xx: a streamable body plus the observed send-to-headers round trip.
    Stream {
        body: Box<dyn StreamBody>,
        rtt: Duration,
    },
    /// Non-2xx: status line data and the (possibly empty) error body.
    Rejected {
        status: u16,
        status_name: String,
        body: String,
    },
}

/// A streamed response body yielding raw chunks.
#[async_trait]
pub trait StreamBody: Send {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ApiError>;
}

/// Transport implementation (HTTP in prod, canned bytes in tests).
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Send one request with the given socket timeout.
    async fn begin(&self, payload: String, timeout: Duration) -> Result<TransportReply, ApiError>;
}

/// Production transport over reqwest.
pub struct HttpTransport {
    url: String,
    api_key: SecretString,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: SecretString) -> Self {
        Self {
            url: format!("{base_url}{CHAT_COMPLETIONS_PATH}"),
            api_key,
        }
    }
}

#[async_trait]
impl StreamTransport for HttpTransport {
    async fn begin(&self, payload: String, timeout: Duration) -> Result<TransportReply, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(ApiError::from)?;

        let started = std::time::Instant::now();
        let response = http
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .header("Content-Type", "application/json")
            .header("User-Agent", "twiddle/0.1")
            .header("Accept", "text/event-stream")
            .header("Connection", "keep-alive")
            .body(payload)
            .send()
            .await?;
        let rtt = started.elapsed();

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(TransportReply::Rejected {
                status: status.as_u16(),
                status_name: status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string(),
                body,
            });
        }

        Ok(TransportReply::Stream {
            body: Box::new(HttpStreamBody { response }),
            rtt,
        })
    }
}

struct HttpStreamBody {
    response: reqwest::Response,
}

#[async_trait]
impl StreamBody for HttpStreamBody {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ApiError> {
        Ok(self.response.chunk().await?.map(|bytes| bytes.to_vec()))
    }
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// Result of one successful turn.
#[derive(Debug)]
pub struct TurnOutcome {
    /// Usage snapshot for the turn (valid only if the server sent one).
    pub usage: Usage,
    /// True when the assistant message carries tool calls to dispatch.
    pub tool_calls_pending: bool,
}

/// Streaming chat client owning the conversation payload contract.
pub struct ChatClient {
    transport: Box<dyn StreamTransport>,
    model: String,
    temperature: Option<f64>,
    max_completion_tokens: Option<u64>,
    system_prompt: String,
    /// Second system message describing the sandbox root and mode.
    tool_context: String,
    /// Send-start → headers-received duration of the last attempt.
    last_rtt: Option<Duration>,
}

impl ChatClient {
    /// Build a client over HTTP from resolved configuration.
    pub fn new(config: &Config, system_prompt: String, tool_context: String) -> Self {
        let transport = HttpTransport::new(
            &config.base_url,
            SecretString::new(config.api_key.expose().to_string()),
        );
        Self::with_transport(Box::new(transport), config, system_prompt, tool_context)
    }

    /// Build a client with an explicit transport (deterministic in tests).
    pub fn with_transport(
        transport: Box<dyn StreamTransport>,
        config: &Config,
        system_prompt: String,
        tool_context: String,
    ) -> Self {
        Self {
            transport,
            model: config.model.clone(),
            temperature: config.temperature,
            max_completion_tokens: config.max_completion_tokens,
            system_prompt,
            tool_context,
            last_rtt: None,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Socket timeout for the next attempt: `clamp(4 × last_rtt, 750ms, 20s)`.
    fn socket_timeout(&self) -> Duration {
        match self.last_rtt {
            Some(rtt) => (rtt * 4).clamp(MIN_SOCKET_TIMEOUT, MAX_SOCKET_TIMEOUT),
            None => MAX_SOCKET_TIMEOUT,
        }
    }

    /// Serialize the request payload for the current conversation state.
    fn build_payload(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<String, ApiError> {
        let mut messages = Vec::with_capacity(conversation.len() + 2);
        messages.push(json!({"role": "system", "content": self.system_prompt}));
        if !self.tool_context.is_empty() {
            messages.push(json!({"role": "system", "content": self.tool_context}));
        }
        for message in conversation.messages() {
            let value = serde_json::to_value(message)
                .map_err(|e| ApiError::StreamFormat(format!("message serialization: {e}")))?;
            messages.push(value);
        }

        let mut payload = json!({
            "model": self.model,
            "stream": true,
            "stream_options": {"include_usage": true},
            "parallel_tool_calls": false,
            "tools": tools,
            "messages": messages,
        });
        if let Some(temperature) = self.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(cap) = self.max_completion_tokens {
            payload["max_completion_tokens"] = json!(cap);
        }

        let serialized = payload.to_string();
        if serialized.len() > MAX_PAYLOAD_BYTES {
            return Err(ApiError::PayloadTooLarge(serialized.len()));
        }
        Ok(serialized)
    }

    /// Run one turn: optionally append `user_text`, stream the model's
    /// response, and append the finalized assistant message.
    ///
    /// On any error the conversation rolls back to its state at entry and no
    /// message survives. At most one retry is spent on the retryable
    /// transport subset, announced with a visible `…retrying…` line.
    pub async fn respond<W: Write>(
        &mut self,
        conversation: &mut Conversation,
        user_text: Option<&str>,
        tools: &[ToolDefinition],
        display: &mut W,
    ) -> Result<TurnOutcome, ApiError> {
        let mut tx = conversation.transaction();
        if let Some(text) = user_text {
            tx.push(Message::user(text));
        }

        let payload = self.build_payload(&tx, tools)?;

        let mut attempt = 0u32;
        let outcome = loop {
            attempt += 1;
            match self.stream_once(payload.clone(), display).await {
                Ok(outcome) => break outcome,
                Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                    let _ = writeln!(display, "…retrying…");
                    let _ = display.flush();
                }
                Err(err) => return Err(err),
            }
        };

        let tool_calls_pending = !outcome.tool_calls.is_empty();
        tx.push(Message::assistant(outcome.transcript, outcome.tool_calls));
        tx.commit();

        Ok(TurnOutcome {
            usage: outcome.usage,
            tool_calls_pending,
        })
    }

    /// One POST attempt decoded to completion.
    async fn stream_once<W: Write>(
        &mut self,
        payload: String,
        display: &mut W,
    ) -> Result<StreamOutcome, ApiError> {
        let reply = self.transport.begin(payload, self.socket_timeout()).await?;

        let (mut body, rtt) = match reply {
            TransportReply::Rejected {
                status,
                status_name,
                body,
            } => {
                // The status line is user-visible whether or not we retry.
                let shown = truncate_with_suffix_by_bytes(body.trim(), MAX_ERROR_BODY_BYTES, "…");
                if shown.is_empty() {
                    let _ = writeln!(display, "error {status_name}");
                } else {
                    let _ = writeln!(display, "error {status_name}: {shown}");
                }
                let _ = display.flush();
                return Err(ApiError::Status { code: status, body });
            }
            TransportReply::Stream { body, rtt } => (body, rtt),
        };
        self.last_rtt = Some(rtt);

        let mut decoder = StreamDecoder::new(display);
        while let Some(chunk) = body.next_chunk().await? {
            decoder.feed(&chunk)?;
            if decoder.is_done() {
                break;
            }
        }
        decoder.finish()
    }
}
