use async_trait::async_trait;
use reqwest::Method;
use shared::{
    error::ProtocolViolation,
    protocol::{
        AnalyticsResetResponse, AnalyticsSummary, ChatRequest, ChatResponse,
        ToolCallResultRequest, ToolCallResultResponse, ANALYTICS_DOWNLOAD_PATH,
        ANALYTICS_RESET_PATH, ANALYTICS_SUMMARY_PATH, CHAT_PATH, TOOL_CALL_RESULT_PATH,
    },
};
use tracing::debug;

use crate::{error::TransportError, transport::TransportClient};

/// The two backend calls a chat turn is made of.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError>;
    async fn tool_call_result(
        &self,
        request: &ToolCallResultRequest,
    ) -> Result<ToolCallResultResponse, TransportError>;
}

#[async_trait]
impl ChatBackend for TransportClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        let response: ChatResponse = self.post(CHAT_PATH, request).await?;
        if let Some(usage) = response.token_usage {
            debug!(
                "chat: token usage prompt={} completion={} total={}",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }
        Ok(response)
    }

    async fn tool_call_result(
        &self,
        request: &ToolCallResultRequest,
    ) -> Result<ToolCallResultResponse, TransportError> {
        let response: ToolCallResultResponse = self.post(TOOL_CALL_RESULT_PATH, request).await?;
        if let Some(usage) = response.token_usage {
            debug!(
                "chat: tool call token usage prompt={} completion={} total={}",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }
        Ok(response)
    }
}

impl TransportClient {
    pub async fn fetch_analytics_summary(&self) -> Result<AnalyticsSummary, TransportError> {
        self.get(ANALYTICS_SUMMARY_PATH).await
    }

    pub async fn reset_analytics(&self) -> Result<AnalyticsResetResponse, TransportError> {
        let bytes = self.request(Method::POST, ANALYTICS_RESET_PATH, None).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(AnalyticsResetResponse::default());
        }
        serde_json::from_slice(&bytes).map_err(|err| {
            TransportError::Protocol(ProtocolViolation::Malformed(format!(
                "{ANALYTICS_RESET_PATH}: {err}"
            )))
        })
    }

    /// Raw report bytes as served by the backend (CSV in practice).
    pub async fn download_analytics(&self) -> Result<Vec<u8>, TransportError> {
        self.request(Method::GET, ANALYTICS_DOWNLOAD_PATH, None).await
    }
}
