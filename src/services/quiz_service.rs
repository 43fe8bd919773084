use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::question::{Question, QUESTIONS_COLLECTION};
use crate::models::quiz::{LoadedQuiz, Quiz, QUIZZES_COLLECTION};
use crate::services::question_cache::QuestionCache;
use crate::services::store_service::{fetch_many, DocumentStore};

/// Loads quizzes and their questions through the store boundary, validating
/// every document on the way in.
#[derive(Clone)]
pub struct QuizService {
    store: Arc<dyn DocumentStore>,
    cache: QuestionCache,
}

impl QuizService {
    pub fn new(store: Arc<dyn DocumentStore>, cache: QuestionCache) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &QuestionCache {
        &self.cache
    }

    pub async fn get_quiz(&self, quiz_id: &str) -> Result<Quiz> {
        let doc = self
            .store
            .get(QUIZZES_COLLECTION, quiz_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Quiz '{}' not found", quiz_id)))?;
        Quiz::from_document(quiz_id, doc)
    }

    /// Questions for `ids`, in the same order. Any missing or malformed
    /// question fails the whole load.
    pub async fn get_questions(&self, ids: &[String]) -> Result<Vec<Question>> {
        let mut loaded: HashMap<String, Arc<Question>> = HashMap::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match self.cache.get(id) {
                Some(question) => {
                    loaded.insert(id.clone(), question);
                }
                None => missing.push(id.clone()),
            }
        }

        if !missing.is_empty() {
            let docs = fetch_many(self.store.as_ref(), QUESTIONS_COLLECTION, &missing).await?;
            for id in &missing {
                let doc = docs
                    .get(id)
                    .cloned()
                    .ok_or_else(|| Error::NotFound(format!("Question '{}' not found", id)))?;
                let question = Arc::new(Question::from_document(id, doc)?);
                self.cache.insert(Arc::clone(&question));
                loaded.insert(id.clone(), question);
            }
            tracing::debug!(fetched = missing.len(), requested = ids.len(), "loaded questions");
        }

        ids.iter()
            .map(|id| {
                loaded
                    .get(id)
                    .map(|q| q.as_ref().clone())
                    .ok_or_else(|| Error::NotFound(format!("Question '{}' not found", id)))
            })
            .collect()
    }

    pub async fn load(&self, quiz_id: &str) -> Result<LoadedQuiz> {
        let quiz = self.get_quiz(quiz_id).await?;
        let questions = self.get_questions(&quiz.question_ids).await?;
        Ok(LoadedQuiz { quiz, questions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store_service::MemoryDocumentStore;
    use serde_json::json;
    use std::time::Duration;

    fn seeded() -> Arc<MemoryDocumentStore> {
        let store = Arc::new(MemoryDocumentStore::new(1));
        store.put(
            QUIZZES_COLLECTION,
            "quiz",
            json!({"title": "Q", "question_ids": ["b", "a"], "duration_minutes": 10}),
        );
        store.put(
            QUESTIONS_COLLECTION,
            "a",
            json!({"type": "mcq", "title": "A", "options": ["x", "y"], "correct_option_index": 0}),
        );
        store.put(
            QUESTIONS_COLLECTION,
            "b",
            json!({"type": "mcq", "title": "B", "options": ["x", "y"], "correct_option_index": 1, "mark": 4}),
        );
        store
    }

    #[tokio::test]
    async fn loads_questions_in_quiz_order() {
        let svc = QuizService::new(seeded(), QuestionCache::new(Duration::from_secs(60)));
        let loaded = svc.load("quiz").await.unwrap();
        let ids: Vec<&str> = loaded.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(loaded.total_marks(), rust_decimal::Decimal::from(5));
        assert!(svc.cache().get("a").is_some());
    }

    #[tokio::test]
    async fn works_with_caching_disabled() {
        let svc = QuizService::new(seeded(), QuestionCache::new(Duration::ZERO));
        let loaded = svc.load("quiz").await.unwrap();
        assert_eq!(loaded.question_count(), 2);
    }

    #[tokio::test]
    async fn rejects_malformed_and_missing_questions() {
        let store = seeded();
        store.put(QUESTIONS_COLLECTION, "a", json!({"type": "mcq", "title": "A", "options": ["x"]}));
        let svc = QuizService::new(store.clone(), QuestionCache::new(Duration::from_secs(60)));
        assert!(matches!(
            svc.load("quiz").await.unwrap_err(),
            Error::InvalidDocument { .. }
        ));

        assert!(matches!(
            svc.get_questions(&["zzz".to_string()]).await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(svc.get_quiz("nope").await.unwrap_err(), Error::NotFound(_)));
    }
}
