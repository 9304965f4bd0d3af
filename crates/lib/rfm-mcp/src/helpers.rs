use std::borrow::Cow;
use std::fmt;

use rfm_core::control::ControlError;
use rfm_core::services::SessionError;
use rmcp::ErrorData;
use rmcp::model::{CallToolResult, Content, ErrorCode};
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use tokio::task::JoinError;
use tracing::warn;

/// Envelope every tool replies with.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ToolResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Why a tool call failed.
#[derive(Debug)]
pub enum ToolFailure {
    /// A domain error reported back to the caller with `success: false`.
    Domain(String),
    /// A protocol level failure surfaced as an MCP error.
    Protocol(ErrorData),
}

pub type ToolResult<T> = Result<T, ToolFailure>;

impl ToolFailure {
    pub fn domain(message: impl fmt::Display) -> Self {
        Self::Domain(message.to_string())
    }
}

impl From<ControlError> for ToolFailure {
    fn from(err: ControlError) -> Self {
        Self::domain(err)
    }
}

impl From<SessionError> for ToolFailure {
    fn from(err: SessionError) -> Self {
        Self::domain(err)
    }
}

impl From<ErrorData> for ToolFailure {
    fn from(err: ErrorData) -> Self {
        Self::Protocol(err)
    }
}

impl From<JoinError> for ToolFailure {
    fn from(err: JoinError) -> Self {
        Self::Protocol(mcp_err(
            ErrorCode::INTERNAL_ERROR,
            format!("background task failed: {err}"),
        ))
    }
}

pub fn mcp_err(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> ErrorData {
    ErrorData {
        code,
        message: message.into(),
        data: None,
    }
}

/// Turns a tool outcome into an MCP result, prefixing failures with `context`.
///
/// # Errors
/// Returns `ErrorData` only for protocol level failures.
pub fn respond<T: Serialize>(
    context: &str,
    message: impl Into<String>,
    result: ToolResult<T>,
) -> Result<CallToolResult, ErrorData> {
    match result {
        Ok(data) => {
            let response = ToolResponse {
                success: true,
                message: message.into(),
                data: Some(data),
            };
            Ok(CallToolResult::success(vec![Content::json(response)?]))
        }
        Err(ToolFailure::Domain(reason)) => {
            warn!(tool = context, error = %reason, "tool call failed");
            let response = ToolResponse::<()> {
                success: false,
                message: format!("{context}. {reason}"),
                data: None,
            };
            Ok(CallToolResult::error(vec![Content::json(response)?]))
        }
        Err(ToolFailure::Protocol(err)) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(result: &CallToolResult) -> serde_json::Value {
        let content = serde_json::to_value(&result.content[0]).expect("serialize content");
        let text = content["text"].as_str().expect("text content");
        serde_json::from_str(text).expect("json payload")
    }

    #[test]
    fn successes_carry_data() {
        let result = respond("Failed to list", "Listed", Ok(vec![1, 2])).expect("result");
        assert_ne!(result.is_error, Some(true));
        let body = payload(&result);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], serde_json::json!([1, 2]));
    }

    #[test]
    fn domain_failures_are_not_protocol_errors() {
        let result = respond::<()>(
            "Failed to add table",
            "unused",
            Err(ToolFailure::domain("table 'USERS' already exists")),
        )
        .expect("domain failures are tool results");
        assert_eq!(result.is_error, Some(true));
        let body = payload(&result);
        assert_eq!(body["success"], false);
        assert_eq!(
            body["message"],
            "Failed to add table. table 'USERS' already exists"
        );
        assert!(body.get("data").is_none());
    }
}
