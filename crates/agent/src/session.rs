use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::llm::ToolCall;

/// Case-sensitive conversation identifier. `lead-42` and `Lead-42` are two
/// different customers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One transcript entry. Tool requests and results are recorded as synthetic
/// turns between the user message and the assistant's final reply, so the
/// oracle sees its own tool history on the next decision.
#[derive(Clone, Debug, PartialEq)]
pub enum Turn {
    User { text: String },
    Assistant { text: String },
    ToolRequest { call: ToolCall },
    ToolResult { call_id: String, tool: String, text: String },
}

/// Per-conversation state: an append-only transcript plus scratch key-value
/// memory for cross-turn context. Lives for the process lifetime only.
#[derive(Clone, Debug)]
pub struct Session {
    id: SessionId,
    transcript: Vec<Turn>,
    scratch: HashMap<String, String>,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self { id, transcript: Vec::new(), scratch: HashMap::new(), created_at: Utc::now() }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Ordered transcript. There is deliberately no API to remove or reorder
    /// turns.
    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.transcript.push(Turn::User { text: text.into() });
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.transcript.push(Turn::Assistant { text: text.into() });
    }

    pub fn push_tool_request(&mut self, call: ToolCall) {
        self.transcript.push(Turn::ToolRequest { call });
    }

    pub fn push_tool_result(
        &mut self,
        call_id: impl Into<String>,
        tool: impl Into<String>,
        text: impl Into<String>,
    ) {
        self.transcript.push(Turn::ToolResult {
            call_id: call_id.into(),
            tool: tool.into(),
            text: text.into(),
        });
    }

    pub fn remember(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.scratch.insert(key.into(), value.into());
    }

    pub fn recall(&self, key: &str) -> Option<&str> {
        self.scratch.get(key).map(String::as_str)
    }
}
