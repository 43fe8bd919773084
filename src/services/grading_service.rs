use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::execution::{ExecutionResult, ExecutionStatus, TestCaseResult};
use crate::models::question::{Question, QuestionKind, TestCase};
use crate::models::result::{QuestionResult, QuestionStatus};
use crate::services::execution_client::{ExecutionClient, ExecutionFailure, RunOutcome, RunRequest};
use crate::services::language::runtime_id;

#[derive(Clone)]
pub struct GradingService {
    client: Arc<dyn ExecutionClient>,
}

impl GradingService {
    pub fn new(client: Arc<dyn ExecutionClient>) -> Self {
        Self { client }
    }

    /// Runs `source_code` against every test case.
    ///
    /// Only an unsupported language is returned as an error, and it is
    /// returned before anything is sent. Every execution problem after that
    /// ends up inside the returned `ExecutionResult`.
    pub async fn execute(
        &self,
        source_code: &str,
        language: &str,
        test_cases: &[TestCase],
    ) -> Result<ExecutionResult> {
        let language_id =
            runtime_id(language).ok_or_else(|| Error::UnsupportedLanguage(language.to_string()))?;

        let compile_check = self
            .client
            .run(RunRequest {
                language_id,
                source_code: source_code.to_string(),
                stdin: None,
                expected_output: None,
            })
            .await;

        match compile_check {
            Ok(outcome) if outcome.is_compilation_error() => {
                let diagnostic = first_non_empty(&[
                    outcome.compile_output.as_deref(),
                    outcome.message.as_deref(),
                ])
                .unwrap_or_else(|| outcome.status_description.clone());
                tracing::info!(language, tests = test_cases.len(), "compilation failed; skipping test runs");
                return Ok(not_run(
                    test_cases,
                    ExecutionStatus::CompilationError,
                    &diagnostic,
                    Some(diagnostic.clone()),
                    None,
                ));
            }
            Ok(_) => {}
            Err(failure) => {
                tracing::warn!(language, error = %failure, "compilation check failed");
                let marker = failure_text(&failure);
                return Ok(not_run(
                    test_cases,
                    ExecutionStatus::InternalError,
                    &marker,
                    None,
                    Some(failure.to_string()),
                ));
            }
        }

        let runs = test_cases.iter().map(|tc| {
            self.client.run(RunRequest {
                language_id,
                source_code: source_code.to_string(),
                stdin: Some(tc.input.clone()),
                expected_output: Some(tc.expected_output.clone()),
            })
        });
        let outcomes = join_all(runs).await;

        let mut test_results = Vec::with_capacity(test_cases.len());
        let mut time = 0.0_f64;
        let mut memory = 0_u64;
        let mut failed_calls = 0_usize;

        for (tc, outcome) in test_cases.iter().zip(outcomes) {
            let (passed, actual_output) = match outcome {
                Ok(outcome) => {
                    time += outcome.time.unwrap_or(0.0);
                    memory = memory.max(outcome.memory.unwrap_or(0));
                    (outcome.is_accepted(), actual_output(&outcome))
                }
                Err(failure) => {
                    failed_calls += 1;
                    tracing::warn!(language, error = %failure, "test case execution failed");
                    (false, failure_text(&failure))
                }
            };
            test_results.push(TestCaseResult {
                input: tc.input.clone(),
                expected_output: tc.expected_output.clone(),
                actual_output,
                passed,
                is_hidden: tc.is_hidden,
            });
        }

        let total_tests = test_results.len();
        let passed_tests = test_results.iter().filter(|r| r.passed).count();
        let status = if total_tests > 0 && passed_tests == total_tests {
            ExecutionStatus::Accepted
        } else {
            ExecutionStatus::WrongAnswer
        };

        tracing::info!(
            language,
            passed = passed_tests,
            total = total_tests,
            failed_calls,
            status = %status,
            "graded submission"
        );

        Ok(ExecutionResult {
            status,
            passed_tests,
            total_tests,
            test_results,
            compile_output: None,
            error: None,
            time,
            memory,
        })
    }

    /// Scores one question against the candidate's raw answer.
    pub async fn grade_question(
        &self,
        question: &Question,
        answer: Option<&str>,
    ) -> Result<QuestionResult> {
        let max_score = question.effective_mark();
        let answer = answer.filter(|a| !a.trim().is_empty());

        let Some(answer) = answer else {
            return Ok(QuestionResult {
                question_id: question.id.clone(),
                score: Decimal::ZERO,
                max_score,
                status: QuestionStatus::Unanswered,
                user_answer: None,
                execution_status: None,
                test_results: None,
            });
        };

        match &question.kind {
            QuestionKind::MultipleChoice(mc) => {
                let correct = answer.trim() == mc.correct_option_index.to_string();
                Ok(QuestionResult {
                    question_id: question.id.clone(),
                    score: if correct { max_score } else { Decimal::ZERO },
                    max_score,
                    status: if correct {
                        QuestionStatus::Correct
                    } else {
                        QuestionStatus::Incorrect
                    },
                    user_answer: Some(answer.to_string()),
                    execution_status: None,
                    test_results: None,
                })
            }
            QuestionKind::Coding(code) => {
                let result = self.execute(answer, &code.language, &code.test_cases).await?;
                let (score, status) = coding_score(result.passed_tests, result.total_tests, max_score);
                Ok(QuestionResult {
                    question_id: question.id.clone(),
                    score,
                    max_score,
                    status,
                    user_answer: Some(answer.to_string()),
                    execution_status: Some(result.status),
                    test_results: Some(result.test_results),
                })
            }
        }
    }
}

/// `passed / total * mark`, rounded to two decimal places.
pub fn coding_score(passed: usize, total: usize, mark: Decimal) -> (Decimal, QuestionStatus) {
    if total == 0 || passed == 0 {
        return (Decimal::ZERO, QuestionStatus::Incorrect);
    }
    let passed = passed.min(total);
    let score = (Decimal::from(passed as u64) / Decimal::from(total as u64) * mark).round_dp(2);
    let status = if passed == total {
        QuestionStatus::Correct
    } else {
        QuestionStatus::Partial
    };
    (score, status)
}

fn not_run(
    test_cases: &[TestCase],
    status: ExecutionStatus,
    actual_output: &str,
    compile_output: Option<String>,
    error: Option<String>,
) -> ExecutionResult {
    ExecutionResult {
        status,
        passed_tests: 0,
        total_tests: test_cases.len(),
        test_results: test_cases
            .iter()
            .map(|tc| TestCaseResult {
                input: tc.input.clone(),
                expected_output: tc.expected_output.clone(),
                actual_output: actual_output.to_string(),
                passed: false,
                is_hidden: tc.is_hidden,
            })
            .collect(),
        compile_output,
        error,
        time: 0.0,
        memory: 0,
    }
}

fn actual_output(outcome: &RunOutcome) -> String {
    let stdout = outcome.stdout.as_deref().map(str::trim).unwrap_or("");
    if outcome.is_accepted() || !stdout.is_empty() {
        return stdout.to_string();
    }
    first_non_empty(&[
        outcome.stderr.as_deref(),
        outcome.compile_output.as_deref(),
        outcome.message.as_deref(),
    ])
    .unwrap_or_else(|| outcome.status_description.clone())
}

fn failure_text(failure: &ExecutionFailure) -> String {
    match failure {
        ExecutionFailure::Timeout(after) => {
            format!("Execution timed out after {} ms", after.as_millis())
        }
        other => format!("Execution failed: {}", other),
    }
}

fn first_non_empty(candidates: &[Option<&str>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
