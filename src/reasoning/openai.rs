//! Chat-completions reasoner with function calling.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{ExponentialBackoff, Reasoner, ReasonerError, ReasoningRequest};
use crate::conversation::MessageId;
use crate::types::{AssistantTurn, Message, ToolRequest, ToolSpec};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_RETRIES: u32 = 5;
const CHAT_COMPLETIONS_PATH: &str = "chat/completions";

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub backoff: ExponentialBackoff,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.0,
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout: Duration::from_secs(120),
            backoff: ExponentialBackoff::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url, CHAT_COMPLETIONS_PATH)
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<OutboundMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OutboundTool>,
    temperature: f32,
}

#[derive(Serialize)]
struct OutboundMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OutboundToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OutboundMessage {
    fn plain(role: &'static str, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Serialize)]
struct OutboundTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OutboundFunction,
}

#[derive(Serialize)]
struct OutboundFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Serialize)]
struct OutboundToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionCall,
}

#[derive(Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    id: String,
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: InboundMessage,
}

#[derive(Deserialize)]
struct InboundMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<InboundToolCall>,
}

#[derive(Deserialize)]
struct InboundToolCall {
    id: String,
    function: FunctionCall,
}

fn to_outbound(message: &Message) -> OutboundMessage {
    match message {
        Message::User(user) => OutboundMessage::plain("user", user.text.clone()),
        Message::Assistant(turn) => {
            let calls: Vec<OutboundToolCall> = turn
                .tool_requests
                .iter()
                .map(|r| OutboundToolCall {
                    id: r.id.clone(),
                    kind: "function",
                    function: FunctionCall {
                        name: r.name.clone(),
                        arguments: r.args_value().to_string(),
                    },
                })
                .collect();
            OutboundMessage {
                role: "assistant",
                content: turn.text.clone(),
                tool_calls: (!calls.is_empty()).then_some(calls),
                tool_call_id: None,
            }
        }
        Message::ToolResult(result) => OutboundMessage {
            role: "tool",
            content: Some(result.content_text()),
            tool_calls: None,
            tool_call_id: Some(result.request_id.clone()),
        },
    }
}

fn to_outbound_tool(spec: &ToolSpec) -> OutboundTool {
    OutboundTool {
        kind: "function",
        function: OutboundFunction {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: spec.schema.clone(),
        },
    }
}

fn to_turn(response: ChatCompletionResponse) -> Result<AssistantTurn, ReasonerError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ReasonerError::invalid_response("response has no choices"))?;

    let mut turn = AssistantTurn::new(MessageId::from(response.id));
    turn.text = choice.message.content;
    for call in choice.message.tool_calls {
        let args: Value = if call.function.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|e| {
                ReasonerError::invalid_response(format!(
                    "arguments for {} are not JSON: {}",
                    call.function.name, e
                ))
            })?
        };
        turn = turn.with_request(ToolRequest::new(call.id, call.function.name).with_args(args));
    }
    Ok(turn)
}

// ============================================================================
// Reasoner
// ============================================================================

pub struct OpenAiReasoner {
    config: OpenAiConfig,
    http: reqwest::Client,
}

impl OpenAiReasoner {
    pub fn new(config: OpenAiConfig) -> Result<Self, ReasonerError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ReasonerError::Configuration {
                message: e.to_string(),
            })?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn build_body<'a>(&'a self, request: &ReasoningRequest) -> ChatCompletionRequest<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(OutboundMessage::plain("system", request.instructions.clone()));
        messages.extend(request.messages.iter().map(to_outbound));
        ChatCompletionRequest {
            model: &self.config.model,
            messages,
            tools: request.tools.iter().map(to_outbound_tool).collect(),
            temperature: self.config.temperature,
        }
    }

    async fn send_once(
        &self,
        body: &ChatCompletionRequest<'_>,
    ) -> Result<AssistantTurn, ReasonerError> {
        let response = self
            .http
            .post(self.config.endpoint())
            .bearer_auth(self.config.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| ReasonerError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let message = response.text().await.unwrap_or_default();
            return Err(ReasonerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ReasonerError::invalid_response(e.to_string()))?;
        to_turn(parsed)
    }
}

#[async_trait]
impl Reasoner for OpenAiReasoner {
    fn name(&self) -> &str {
        "openai"
    }

    async fn reason(&self, request: &ReasoningRequest) -> Result<AssistantTurn, ReasonerError> {
        let body = self.build_body(request);
        let mut attempt = 0;
        loop {
            match self.send_once(&body).await {
                Ok(turn) => {
                    debug!(
                        model = %self.config.model,
                        message_id = %turn.id,
                        tool_requests = turn.tool_requests.len(),
                        "Chat completion received"
                    );
                    return Ok(turn);
                }
                Err(e) if attempt < self.config.max_retries && e.is_retryable() => {
                    attempt += 1;
                    let delay = self.config.backoff.delay_for(attempt);
                    warn!(
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying chat completion after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
