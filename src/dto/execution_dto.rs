use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::models::execution::ExecutionResult;

/// Body sent to `POST /submissions` on the execution service. Text fields are
/// base64 encoded.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionPayload {
    pub language_id: u32,
    pub source_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionStatus {
    pub id: u32,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionResponse {
    pub status: Option<SubmissionStatus>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
    pub message: Option<String>,
    /// Seconds, sent either as a string ("0.012") or a number.
    pub time: Option<JsonValue>,
    /// Kilobytes.
    pub memory: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RunCodeRequest {
    #[validate(length(min = 1))]
    pub question_id: String,
    pub source_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunCodeResponse {
    pub question_id: String,
    pub result: ExecutionResult,
}
