use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::error::{Error, Result};
use crate::services::language::runtime_id;

pub const QUESTIONS_COLLECTION: &str = "questions";

const DEFAULT_MCQ_MARK: u32 = 1;
const DEFAULT_CODING_MARK: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Question {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub mark: Option<u32>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    #[serde(alias = "mcq")]
    MultipleChoice(MultipleChoiceDetails),
    Coding(CodingDetails),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipleChoiceDetails {
    pub options: Vec<String>,
    pub correct_option_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodingDetails {
    pub language: String,
    #[serde(default)]
    pub starter_code: String,
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    #[serde(default)]
    pub is_hidden: bool,
}

impl Question {
    /// Parses a raw store document and checks the shape invariants the
    /// grading and session code rely on.
    pub fn from_document(id: &str, mut doc: JsonValue) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidDocument {
            collection: QUESTIONS_COLLECTION.to_string(),
            id: id.to_string(),
            reason,
        };

        let obj = doc
            .as_object_mut()
            .ok_or_else(|| invalid("document is not an object".to_string()))?;
        match obj.get("id").and_then(|v| v.as_str()) {
            Some(embedded) if embedded != id => {
                return Err(invalid(format!("embedded id '{}' does not match", embedded)));
            }
            Some(_) => {}
            None => {
                obj.insert("id".to_string(), JsonValue::String(id.to_string()));
            }
        }

        let question: Question =
            serde_json::from_value(doc).map_err(|e| invalid(e.to_string()))?;
        question.validate().map_err(|e| invalid(e.to_string()))?;
        question.check_kind().map_err(invalid)?;
        Ok(question)
    }

    fn check_kind(&self) -> std::result::Result<(), String> {
        match &self.kind {
            QuestionKind::MultipleChoice(mc) => {
                if mc.options.len() < 2 {
                    return Err("multiple choice needs at least two options".to_string());
                }
                if mc.correct_option_index as usize >= mc.options.len() {
                    return Err(format!(
                        "correct_option_index {} out of range for {} options",
                        mc.correct_option_index,
                        mc.options.len()
                    ));
                }
            }
            QuestionKind::Coding(code) => {
                if code.test_cases.is_empty() {
                    return Err("coding question needs at least one test case".to_string());
                }
                if runtime_id(&code.language).is_none() {
                    return Err(format!("unsupported language '{}'", code.language));
                }
            }
        }
        Ok(())
    }

    /// Point value, falling back to the per-type default.
    pub fn effective_mark(&self) -> Decimal {
        let mark = self.mark.unwrap_or(match self.kind {
            QuestionKind::MultipleChoice(_) => DEFAULT_MCQ_MARK,
            QuestionKind::Coding(_) => DEFAULT_CODING_MARK,
        });
        Decimal::from(mark)
    }
}

/// What a candidate may see of a question while the attempt is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateQuestion {
    pub id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub mark: Decimal,
    #[serde(flatten)]
    pub kind: CandidateQuestionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CandidateQuestionKind {
    MultipleChoice {
        options: Vec<String>,
    },
    Coding {
        language: String,
        starter_code: String,
        sample_test_cases: Vec<TestCase>,
    },
}

impl From<&Question> for CandidateQuestion {
    fn from(q: &Question) -> Self {
        let kind = match &q.kind {
            QuestionKind::MultipleChoice(mc) => CandidateQuestionKind::MultipleChoice {
                options: mc.options.clone(),
            },
            QuestionKind::Coding(code) => CandidateQuestionKind::Coding {
                language: code.language.clone(),
                starter_code: code.starter_code.clone(),
                sample_test_cases: code
                    .test_cases
                    .iter()
                    .filter(|tc| !tc.is_hidden)
                    .cloned()
                    .collect(),
            },
        };
        Self {
            id: q.id.clone(),
            title: q.title.clone(),
            description: q.description.clone(),
            difficulty: q.difficulty,
            mark: q.effective_mark(),
            kind,
        }
    }
}
