use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolViolation;

pub const CHAT_PATH: &str = "/chat";
pub const TOOL_CALL_RESULT_PATH: &str = "/tool-call-result";
pub const ANALYTICS_SUMMARY_PATH: &str = "/analytics/summary";
pub const ANALYTICS_RESET_PATH: &str = "/analytics/reset";
pub const ANALYTICS_DOWNLOAD_PATH: &str = "/analytics/download";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryRole {
    User,
    Assistant,
    System,
    Tool,
}

/// A single entry of the conversation history exchanged with the backend.
///
/// The server owns this history. Fields the client has no use for
/// (`tool_calls`, `tool_call_id`, ...) are kept in `extra` so that replaying
/// the history back to the server is lossless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: HistoryRole,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HistoryEntry {
    pub fn new(role: HistoryRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            extra: Map::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(HistoryRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(HistoryRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(HistoryRole::System, content)
    }

    pub fn content_text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub urgency: String,
    pub upsell_opportunity: bool,
    pub customer_interest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
}

/// Structured classification of a finished conversation, attached by the
/// backend to a chat response when it decides the exchange is over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub sentiment: Sentiment,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    pub summary: String,
    pub department: String,
    pub insights: Insights,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub chat_response: Option<String>,
    pub conversation_history: Vec<HistoryEntry>,
    pub tool_call_detected: bool,
    #[serde(default)]
    pub summary: Option<Summary>,
    #[serde(default)]
    pub token_usage: Option<TokenUsage>,
    #[serde(default)]
    pub cost: Option<Value>,
}

/// What a `/chat` round trip asks the client to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatReply {
    Answer {
        text: String,
        history: Vec<HistoryEntry>,
        summary: Option<Summary>,
    },
    ToolCall {
        history: Vec<HistoryEntry>,
    },
}

impl ChatResponse {
    pub fn into_reply(self) -> Result<ChatReply, ProtocolViolation> {
        if self.tool_call_detected {
            return Ok(ChatReply::ToolCall {
                history: self.conversation_history,
            });
        }

        let text = self
            .chat_response
            .ok_or(ProtocolViolation::MissingField("chat_response"))?;
        Ok(ChatReply::Answer {
            text,
            history: self.conversation_history,
            summary: self.summary,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResultRequest {
    pub conversation_history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResultResponse {
    pub final_response: String,
    pub final_conversation_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub summary: Option<Summary>,
    #[serde(default)]
    pub token_usage: Option<TokenUsage>,
    #[serde(default)]
    pub cost: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestRecord {
    pub date: String,
    pub model: String,
    pub sent_tokens: u64,
    pub received_tokens: u64,
    pub cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_cost: f64,
    pub total_requests: u64,
    pub average_cost_per_request: f64,
    pub total_sent_tokens: u64,
    pub total_received_tokens: u64,
    pub requests_by_date: Vec<RequestRecord>,
    pub cost_by_model: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsResetResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub analytics: Option<AnalyticsSummary>,
}
