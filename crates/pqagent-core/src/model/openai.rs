//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{AssistantReply, Message, ModelClient, ModelRequest, ProviderError, Role, ToolCall};
use crate::tools::ToolDeclaration;

/// Chat-completions client for OpenAI and compatible endpoints.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            ProviderError::new(
                super::ProviderErrorKind::Unknown,
                format!("failed to build HTTP client: {e}"),
            )
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn build_body(request: &ModelRequest<'_>) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(message_to_wire).collect();
        let mut body = json!({
            "model": request.model,
            "messages": messages,
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request.tools.iter().map(tool_to_wire).collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = json!(request.tool_choice);
            if let Some(parallel) = request.parallel_tool_calls {
                body["parallel_tool_calls"] = json!(parallel);
            }
        }

        body
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn id(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &ModelRequest<'_>) -> Result<AssistantReply, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(request);

        info!(
            model = request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "calling chat completions"
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::network(&e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| ProviderError::network(&e))?;
        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16(), &text));
        }

        debug!(bytes = text.len(), "chat completion received");
        parse_completion(&text)
    }
}

fn message_to_wire(message: &Message) -> Value {
    match message.role {
        Role::Assistant if !message.tool_calls.is_empty() => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|tc| {
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {"name": tc.name, "arguments": tc.arguments},
                    })
                })
                .collect();
            json!({"role": "assistant", "content": message.content, "tool_calls": calls})
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
            "content": message.content,
        }),
        role => json!({"role": role, "content": message.content}),
    }
}

fn tool_to_wire(tool: &ToolDeclaration) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        },
    })
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Option<String>,
}

fn parse_completion(text: &str) -> Result<AssistantReply, ProviderError> {
    let response: CompletionResponse = serde_json::from_str(text)
        .map_err(|e| ProviderError::invalid_response(format!("malformed completion: {e}")))?;

    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| ProviderError::invalid_response("no choices in response"))?;

    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            ToolCall::new(
                tc.id,
                tc.function.name,
                tc.function.arguments.unwrap_or_else(|| "{}".to_string()),
            )
        })
        .collect();

    Ok(AssistantReply::with_tool_calls(message.content, tool_calls))
}
