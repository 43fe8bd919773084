use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::dto::execution_dto::{SubmissionPayload, SubmissionResponse};
use crate::utils::encoding::{decode_output, encode};

pub const STATUS_ACCEPTED: u32 = 3;
pub const STATUS_COMPILATION_ERROR: u32 = 6;

/// One run of a program on the execution service, in plain text.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub language_id: u32,
    pub source_code: String,
    pub stdin: Option<String>,
    pub expected_output: Option<String>,
}

/// Decoded response of the execution service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutcome {
    pub status_id: u32,
    pub status_description: String,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
    pub message: Option<String>,
    pub time: Option<f64>,
    pub memory: Option<u64>,
}

impl RunOutcome {
    pub fn is_accepted(&self) -> bool {
        self.status_id == STATUS_ACCEPTED
    }

    pub fn is_compilation_error(&self) -> bool {
        self.status_id == STATUS_COMPILATION_ERROR
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionFailure {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    async fn run(&self, request: RunRequest) -> Result<RunOutcome, ExecutionFailure>;
}

/// Client for a Judge0-compatible execution API.
#[derive(Clone)]
pub struct Judge0Client {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    api_host: Option<String>,
    timeout: Duration,
}

impl Judge0Client {
    pub fn new(
        client: Client,
        base_url: String,
        api_key: Option<String>,
        api_host: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            api_host,
            timeout,
        }
    }

    fn classify(&self, err: reqwest::Error) -> ExecutionFailure {
        if err.is_timeout() {
            ExecutionFailure::Timeout(self.timeout)
        } else if err.is_decode() {
            ExecutionFailure::Malformed(err.to_string())
        } else {
            ExecutionFailure::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl ExecutionClient for Judge0Client {
    async fn run(&self, request: RunRequest) -> Result<RunOutcome, ExecutionFailure> {
        let payload = SubmissionPayload {
            language_id: request.language_id,
            source_code: encode(&request.source_code),
            stdin: request.stdin.as_deref().map(encode),
            expected_output: request.expected_output.as_deref().map(encode),
        };

        let mut req = self
            .client
            .post(format!(
                "{}/submissions?base64_encoded=true&wait=true",
                self.base_url
            ))
            .timeout(self.timeout)
            .json(&payload);
        if let Some(key) = &self.api_key {
            req = req.header("X-RapidAPI-Key", key);
        }
        if let Some(host) = &self.api_host {
            req = req.header("X-RapidAPI-Host", host);
        }

        let resp = req.send().await.map_err(|e| self.classify(e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExecutionFailure::Transport(format!(
                "execution service returned {}: {}",
                status, body
            )));
        }

        let body = resp
            .json::<SubmissionResponse>()
            .await
            .map_err(|e| self.classify(e))?;
        outcome_from_response(body)
    }
}

fn outcome_from_response(body: SubmissionResponse) -> Result<RunOutcome, ExecutionFailure> {
    let status = body
        .status
        .ok_or_else(|| ExecutionFailure::Malformed("missing status".to_string()))?;

    let time = match body.time {
        Some(JsonValue::String(s)) => s.trim().parse::<f64>().ok(),
        Some(JsonValue::Number(n)) => n.as_f64(),
        _ => None,
    };

    Ok(RunOutcome {
        status_id: status.id,
        status_description: status.description,
        stdout: body.stdout.as_deref().map(decode_output),
        stderr: body.stderr.as_deref().map(decode_output),
        compile_output: body.compile_output.as_deref().map(decode_output),
        message: body.message.as_deref().map(decode_output),
        time,
        memory: body.memory,
    })
}
