use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use showroom_core::config::{LlmConfig, LlmProvider};

use crate::session::Turn;

/// Schema entry advertised to the decision oracle for one callable tool.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON-schema object describing the argument map.
    pub parameters: Value,
}

/// One tool invocation requested by the oracle.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// What the oracle wants next: either a final customer-facing answer or one
/// or more tool invocations.
#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    Reply(String),
    ToolCalls(Vec<ToolCall>),
}

/// Oracle transport failures. Always recovered at the dispatch boundary;
/// never fatal to the session.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Http(String),
    #[error("oracle request timed out")]
    Timeout,
    #[error("oracle returned malformed output: {0}")]
    Malformed(String),
}

/// Narrow seam between the dispatch loop and the external language model.
/// The loop's state machine is deterministic and oracle-agnostic; tests
/// substitute a [`ScriptedOracle`].
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn decide(
        &self,
        transcript: &[Turn],
        tools: &[ToolSpec],
    ) -> Result<Decision, OracleError>;
}

const SYSTEM_PROMPT: &str = "You are a friendly and professional auto dealership assistant. \
Greet customers warmly, understand what they are looking for, ask clarifying questions about \
their preferences, help them find the right vehicle, and book test drives when requested. \
Use the available tools to search the catalog, check slot availability, and book test drives. \
Never invent vehicles or time slots; always go through the tools.";

/// OpenAI-style `/chat/completions` client with function-calling tools.
/// Works against the OpenAI API or any compatible endpoint (ollama serves
/// the same shape under `/v1`).
pub struct ChatCompletionsOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    max_retries: u32,
}

impl ChatCompletionsOracle {
    pub fn from_config(config: &LlmConfig) -> Result<Self, OracleError> {
        let endpoint = match config.provider {
            LlmProvider::OpenAi => config
                .base_url
                .as_deref()
                .map(|base| format!("{}/chat/completions", base.trim_end_matches('/')))
                .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string()),
            LlmProvider::Ollama => {
                let base = config
                    .base_url
                    .as_deref()
                    .ok_or_else(|| OracleError::Http("ollama base_url missing".to_string()))?;
                format!("{}/v1/chat/completions", base.trim_end_matches('/'))
            }
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| OracleError::Http(error.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, OracleError> {
        let mut attempt = 0;
        loop {
            let mut builder = self.client.post(&self.endpoint).json(request);
            if let Some(key) = &self.api_key {
                builder = builder.bearer_auth(key.expose_secret());
            }

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() && attempt < self.max_retries {
                        attempt += 1;
                        continue;
                    }
                    if !status.is_success() {
                        return Err(OracleError::Http(format!(
                            "oracle endpoint returned {status}"
                        )));
                    }
                    return response
                        .json::<ChatResponse>()
                        .await
                        .map_err(|error| OracleError::Malformed(error.to_string()));
                }
                Err(error) if error.is_timeout() => return Err(OracleError::Timeout),
                Err(_) if attempt < self.max_retries => {
                    attempt += 1;
                }
                Err(error) => return Err(OracleError::Http(error.to_string())),
            }
        }
    }
}

#[async_trait]
impl DecisionOracle for ChatCompletionsOracle {
    async fn decide(
        &self,
        transcript: &[Turn],
        tools: &[ToolSpec],
    ) -> Result<Decision, OracleError> {
        let request = ChatRequest {
            model: &self.model,
            messages: wire_messages(transcript),
            tools: tools.iter().map(WireTool::from_spec).collect(),
        };

        let response = self.send(&request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| OracleError::Malformed("response carried no choices".to_string()))?;

        if !choice.message.tool_calls.is_empty() {
            let calls = choice
                .message
                .tool_calls
                .into_iter()
                .map(|call| {
                    let arguments =
                        serde_json::from_str::<Value>(&call.function.arguments).map_err(|_| {
                            OracleError::Malformed(format!(
                                "tool call `{}` carried non-JSON arguments",
                                call.function.name
                            ))
                        })?;
                    Ok(ToolCall { id: call.id, name: call.function.name, arguments })
                })
                .collect::<Result<Vec<_>, OracleError>>()?;
            return Ok(Decision::ToolCalls(calls));
        }

        match choice.message.content {
            Some(content) if !content.trim().is_empty() => Ok(Decision::Reply(content)),
            _ => Err(OracleError::Malformed(
                "response carried neither content nor tool calls".to_string(),
            )),
        }
    }
}

fn wire_messages(transcript: &[Turn]) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(transcript.len() + 1);
    messages.push(WireMessage {
        role: "system",
        content: Some(SYSTEM_PROMPT.to_string()),
        tool_calls: None,
        tool_call_id: None,
    });

    for turn in transcript {
        match turn {
            Turn::User { text } => messages.push(WireMessage {
                role: "user",
                content: Some(text.clone()),
                tool_calls: None,
                tool_call_id: None,
            }),
            Turn::Assistant { text } => messages.push(WireMessage {
                role: "assistant",
                content: Some(text.clone()),
                tool_calls: None,
                tool_call_id: None,
            }),
            Turn::ToolRequest { call } => messages.push(WireMessage {
                role: "assistant",
                content: None,
                tool_calls: Some(vec![WireToolCall {
                    id: call.id.clone(),
                    kind: "function",
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    },
                }]),
                tool_call_id: None,
            }),
            Turn::ToolResult { call_id, text, .. } => messages.push(WireMessage {
                role: "tool",
                content: Some(text.clone()),
                tool_calls: None,
                tool_call_id: Some(call_id.clone()),
            }),
        }
    }

    messages
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolSpec,
}

impl<'a> WireTool<'a> {
    fn from_spec(spec: &'a ToolSpec) -> Self {
        Self { kind: "function", function: spec }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ResponseFunctionCall {
    name: String,
    arguments: String,
}

/// Deterministic oracle that replays a fixed script of decisions. Used by the
/// dispatch-loop tests and the CLI smoke command, where a network-backed
/// oracle would make the outcome non-reproducible.
pub struct ScriptedOracle {
    steps: Mutex<VecDeque<Result<Decision, OracleError>>>,
}

impl ScriptedOracle {
    pub fn new(steps: Vec<Result<Decision, OracleError>>) -> Self {
        Self { steps: Mutex::new(steps.into_iter().collect()) }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Ok(Decision::Reply(text.to_string()))])
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    async fn decide(
        &self,
        _transcript: &[Turn],
        _tools: &[ToolSpec],
    ) -> Result<Decision, OracleError> {
        self.steps
            .lock()
            .expect("oracle script lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Malformed("oracle script exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::session::Turn;

    use super::{wire_messages, Decision, DecisionOracle, OracleError, ScriptedOracle, ToolCall};

    #[test]
    fn wire_messages_lead_with_the_system_prompt() {
        let transcript = vec![Turn::User { text: "hi".to_string() }];
        let messages = wire_messages(&transcript);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn tool_turns_map_to_assistant_request_plus_tool_result() {
        let call = ToolCall {
            id: "call-1".to_string(),
            name: "list_available_vehicles".to_string(),
            arguments: json!({}),
        };
        let transcript = vec![
            Turn::User { text: "what's available?".to_string() },
            Turn::ToolRequest { call },
            Turn::ToolResult {
                call_id: "call-1".to_string(),
                tool: "list_available_vehicles".to_string(),
                text: "Available vehicles...".to_string(),
            },
        ];

        let messages = wire_messages(&transcript);
        assert_eq!(messages[2].role, "assistant");
        assert!(messages[2].tool_calls.is_some());
        assert_eq!(messages[3].role, "tool");
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call-1"));
    }

    #[tokio::test]
    async fn scripted_oracle_replays_steps_in_order() {
        let oracle = ScriptedOracle::new(vec![
            Ok(Decision::Reply("first".to_string())),
            Ok(Decision::Reply("second".to_string())),
        ]);

        assert_eq!(
            oracle.decide(&[], &[]).await.expect("first step"),
            Decision::Reply("first".to_string())
        );
        assert_eq!(
            oracle.decide(&[], &[]).await.expect("second step"),
            Decision::Reply("second".to_string())
        );
        assert!(matches!(
            oracle.decide(&[], &[]).await,
            Err(OracleError::Malformed(_))
        ));
    }
}
