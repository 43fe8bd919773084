use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    #[serde(rename = "Accepted")]
    Accepted,
    #[serde(rename = "Wrong Answer")]
    WrongAnswer,
    #[serde(rename = "Compilation Error")]
    CompilationError,
    #[serde(rename = "Internal Error")]
    InternalError,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Accepted => "Accepted",
            ExecutionStatus::WrongAnswer => "Wrong Answer",
            ExecutionStatus::CompilationError => "Compilation Error",
            ExecutionStatus::InternalError => "Internal Error",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub passed: bool,
    #[serde(default)]
    pub is_hidden: bool,
}

/// Verdict for one coding submission across all of its test cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub passed_tests: usize,
    pub total_tests: usize,
    pub test_results: Vec<TestCaseResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Seconds, summed over every call.
    pub time: f64,
    /// Kilobytes, maximum over every call.
    pub memory: u64,
}

impl ExecutionResult {
    /// Drops hidden test cases from the per-case list; counts are kept.
    pub fn redact_hidden(mut self) -> Self {
        self.test_results.retain(|tc| !tc.is_hidden);
        self
    }
}
