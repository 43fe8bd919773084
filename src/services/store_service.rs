use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};

/// Keyed JSON documents grouped into collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<JsonValue>>;

    /// Looks up at most `batch_limit()` ids in one round trip. Missing ids are
    /// left out of the result.
    async fn get_batch(&self, collection: &str, ids: &[String]) -> Result<Vec<(String, JsonValue)>>;

    /// Insert-only write; an existing id yields `Error::Conflict`.
    async fn create(&self, collection: &str, id: &str, doc: &JsonValue) -> Result<()>;

    fn batch_limit(&self) -> usize;
}

/// Fetches any number of ids, split into chunks the store accepts.
pub async fn fetch_many(
    store: &dyn DocumentStore,
    collection: &str,
    ids: &[String],
) -> Result<HashMap<String, JsonValue>> {
    let limit = store.batch_limit().max(1);
    let mut found = HashMap::with_capacity(ids.len());
    for chunk in ids.chunks(limit) {
        for (id, doc) in store.get_batch(collection, chunk).await? {
            found.insert(id, doc);
        }
    }
    Ok(found)
}

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    batch_limit: usize,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool, batch_limit: usize) -> Self {
        Self { pool, batch_limit }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<JsonValue>> {
        let row = sqlx::query(r#"SELECT data FROM documents WHERE collection = $1 AND id = $2"#)
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(row.try_get::<JsonValue, _>("data")?)),
            None => Ok(None),
        }
    }

    async fn get_batch(&self, collection: &str, ids: &[String]) -> Result<Vec<(String, JsonValue)>> {
        if ids.len() > self.batch_limit {
            return Err(Error::BadRequest(format!(
                "batch of {} ids exceeds the limit of {}",
                ids.len(),
                self.batch_limit
            )));
        }
        let rows = sqlx::query(
            r#"SELECT id, data FROM documents WHERE collection = $1 AND id = ANY($2)"#,
        )
        .bind(collection)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Ok((row.try_get::<String, _>("id")?, row.try_get::<JsonValue, _>("data")?)))
            .collect()
    }

    async fn create(&self, collection: &str, id: &str, doc: &JsonValue) -> Result<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO NOTHING
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(doc)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(Error::Conflict(format!("{}/{} already exists", collection, id)));
        }
        Ok(())
    }

    fn batch_limit(&self) -> usize {
        self.batch_limit
    }
}

/// Process-local store, used when no database is configured and in tests.
pub struct MemoryDocumentStore {
    docs: RwLock<HashMap<(String, String), JsonValue>>,
    batch_limit: usize,
}

impl MemoryDocumentStore {
    pub fn new(batch_limit: usize) -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            batch_limit: batch_limit.max(1),
        }
    }

    /// Writes without the insert-only check; for seeding fixtures.
    pub fn put(&self, collection: &str, id: &str, doc: JsonValue) {
        self.docs
            .write()
            .expect("document store lock poisoned")
            .insert((collection.to_string(), id.to_string()), doc);
    }

    pub fn count(&self, collection: &str) -> usize {
        self.docs
            .read()
            .expect("document store lock poisoned")
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<JsonValue>> {
        let docs = self.docs.read().expect("document store lock poisoned");
        Ok(docs.get(&(collection.to_string(), id.to_string())).cloned())
    }

    async fn get_batch(&self, collection: &str, ids: &[String]) -> Result<Vec<(String, JsonValue)>> {
        if ids.len() > self.batch_limit {
            return Err(Error::BadRequest(format!(
                "batch of {} ids exceeds the limit of {}",
                ids.len(),
                self.batch_limit
            )));
        }
        let docs = self.docs.read().expect("document store lock poisoned");
        Ok(ids
            .iter()
            .filter_map(|id| {
                docs.get(&(collection.to_string(), id.clone()))
                    .map(|doc| (id.clone(), doc.clone()))
            })
            .collect())
    }

    async fn create(&self, collection: &str, id: &str, doc: &JsonValue) -> Result<()> {
        let mut docs = self.docs.write().expect("document store lock poisoned");
        let key = (collection.to_string(), id.to_string());
        if docs.contains_key(&key) {
            return Err(Error::Conflict(format!("{}/{} already exists", collection, id)));
        }
        docs.insert(key, doc.clone());
        Ok(())
    }

    fn batch_limit(&self) -> usize {
        self.batch_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn fetch_many_splits_into_batches() {
        let store = MemoryDocumentStore::new(2);
        for i in 0..5 {
            store.put("questions", &format!("q{}", i), json!({ "n": i }));
        }
        let ids: Vec<String> = (0..6).map(|i| format!("q{}", i)).collect();

        assert!(store.get_batch("questions", &ids).await.is_err());

        let found = fetch_many(&store, "questions", &ids).await.unwrap();
        assert_eq!(found.len(), 5);
        assert_eq!(found["q4"], json!({ "n": 4 }));
        assert!(!found.contains_key("q5"));
    }

    #[tokio::test]
    async fn create_is_insert_only() {
        let store = MemoryDocumentStore::new(10);
        store.create("quiz_results", "r1", &json!({"score": 1})).await.unwrap();
        let err = store
            .create("quiz_results", "r1", &json!({"score": 2}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(
            store.get("quiz_results", "r1").await.unwrap(),
            Some(json!({"score": 1}))
        );
    }
}
