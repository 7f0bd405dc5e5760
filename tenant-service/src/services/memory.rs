use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use mongodb::bson::{oid::ObjectId, Bson, Document};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::store::{DocumentStore, DocumentStream, UnitCollection};
use super::ServiceError;

#[derive(Default)]
struct MemoryUnit {
    documents: Vec<Document>,
    unique_fields: Vec<String>,
}

type Units = Arc<Mutex<HashMap<String, MemoryUnit>>>;

/// In-process [`DocumentStore`] for tests and local development.
#[derive(Clone, Default)]
pub struct MemoryStore {
    units: Units,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_collection(&self, name: &str) -> bool {
        lock(&self.units)
            .map(|units| units.contains_key(name))
            .unwrap_or(false)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn collection(&self, name: &str) -> Arc<dyn UnitCollection> {
        Arc::new(MemoryCollection {
            name: name.to_string(),
            units: self.units.clone(),
        })
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        lock(&self.units).map(|_| ())
    }
}

struct MemoryCollection {
    name: String,
    units: Units,
}

fn lock(units: &Units) -> Result<MutexGuard<'_, HashMap<String, MemoryUnit>>, ServiceError> {
    units
        .lock()
        .map_err(|e| ServiceError::Store(anyhow::anyhow!("Memory store mutex poisoned: {}", e)))
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, expected)| document.get(key) == Some(expected))
}

fn apply_patch(document: &mut Document, patch: &Document) -> Result<(), ServiceError> {
    for (operator, fields) in patch {
        match (operator.as_str(), fields) {
            ("$set", Bson::Document(fields)) => {
                for (key, value) in fields {
                    document.insert(key.clone(), value.clone());
                }
            }
            _ => {
                return Err(ServiceError::Validation(format!(
                    "Unsupported update operator: {}",
                    operator
                )))
            }
        }
    }
    Ok(())
}

impl MemoryUnit {
    /// Rejects `candidate` if a unique field collides with any document other
    /// than the one at `skip`.
    fn check_unique(&self, candidate: &Document, skip: Option<usize>) -> Result<(), ServiceError> {
        for field in &self.unique_fields {
            let Some(value) = candidate.get(field) else {
                continue;
            };
            let collides = self
                .documents
                .iter()
                .enumerate()
                .any(|(i, existing)| Some(i) != skip && existing.get(field) == Some(value));
            if collides {
                return Err(ServiceError::Conflict(format!(
                    "duplicate key on {}: {}",
                    field, value
                )));
            }
        }
        Ok(())
    }

    fn insert(&mut self, mut document: Document) -> Result<Bson, ServiceError> {
        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }
        let id = document
            .get("_id")
            .cloned()
            .ok_or_else(|| ServiceError::Internal(anyhow::anyhow!("identity key missing")))?;

        if self
            .documents
            .iter()
            .any(|existing| existing.get("_id") == Some(&id))
        {
            return Err(ServiceError::Conflict(format!("duplicate key on _id: {}", id)));
        }
        self.check_unique(&document, None)?;

        self.documents.push(document);
        Ok(id)
    }

    fn update(&mut self, filter: &Document, patch: &Document, many: bool) -> Result<u64, ServiceError> {
        let targets: Vec<usize> = self
            .documents
            .iter()
            .enumerate()
            .filter(|(_, d)| matches(d, filter))
            .map(|(i, _)| i)
            .take(if many { usize::MAX } else { 1 })
            .collect();

        let mut staged = Vec::with_capacity(targets.len());
        for &i in &targets {
            let mut updated = self.documents[i].clone();
            apply_patch(&mut updated, patch)?;
            self.check_unique(&updated, Some(i))?;
            staged.push((i, updated));
        }

        for (i, updated) in staged {
            self.documents[i] = updated;
        }
        Ok(targets.len() as u64)
    }
}

#[async_trait]
impl UnitCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_one(&self, filter: Document) -> Result<Option<Document>, ServiceError> {
        let units = lock(&self.units)?;
        Ok(units
            .get(&self.name)
            .and_then(|unit| unit.documents.iter().find(|d| matches(d, &filter)))
            .cloned())
    }

    async fn find(&self, filter: Document) -> Result<DocumentStream, ServiceError> {
        let snapshot: Vec<Document> = {
            let units = lock(&self.units)?;
            units
                .get(&self.name)
                .map(|unit| {
                    unit.documents
                        .iter()
                        .filter(|d| matches(d, &filter))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };
        Ok(stream::iter(snapshot.into_iter().map(Ok)).boxed())
    }

    async fn insert_one(&self, document: Document) -> Result<Bson, ServiceError> {
        let mut units = lock(&self.units)?;
        units.entry(self.name.clone()).or_default().insert(document)
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<usize, ServiceError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let mut units = lock(&self.units)?;
        let unit = units.entry(self.name.clone()).or_default();
        let mut written = 0;
        for document in documents {
            unit.insert(document)?;
            written += 1;
        }
        Ok(written)
    }

    async fn update_one(&self, filter: Document, patch: Document) -> Result<u64, ServiceError> {
        let mut units = lock(&self.units)?;
        match units.get_mut(&self.name) {
            Some(unit) => unit.update(&filter, &patch, false),
            None => Ok(0),
        }
    }

    async fn update_many(&self, filter: Document, patch: Document) -> Result<u64, ServiceError> {
        let mut units = lock(&self.units)?;
        match units.get_mut(&self.name) {
            Some(unit) => unit.update(&filter, &patch, true),
            None => Ok(0),
        }
    }

    async fn delete_one(&self, filter: Document) -> Result<u64, ServiceError> {
        let mut units = lock(&self.units)?;
        let Some(unit) = units.get_mut(&self.name) else {
            return Ok(0);
        };
        match unit.documents.iter().position(|d| matches(d, &filter)) {
            Some(i) => {
                unit.documents.remove(i);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn count_documents(&self, filter: Document) -> Result<u64, ServiceError> {
        let units = lock(&self.units)?;
        Ok(units
            .get(&self.name)
            .map(|unit| unit.documents.iter().filter(|d| matches(d, &filter)).count() as u64)
            .unwrap_or(0))
    }

    async fn drop_collection(&self) -> Result<(), ServiceError> {
        lock(&self.units)?.remove(&self.name);
        Ok(())
    }

    async fn create_unique_index(&self, field: &str) -> Result<(), ServiceError> {
        let mut units = lock(&self.units)?;
        let unit = units.entry(self.name.clone()).or_default();
        if !unit.unique_fields.iter().any(|f| f == field) {
            unit.unique_fields.push(field.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use mongodb::bson::doc;

    #[tokio::test]
    async fn insert_assigns_identity_keys() {
        let store = MemoryStore::new();
        let coll = store.collection("org_acme");

        let id = coll.insert_one(doc! { "email": "a@x.com" }).await.unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));

        let found = coll.find_one(doc! { "_id": id }).await.unwrap().unwrap();
        assert_eq!(found.get_str("email").unwrap(), "a@x.com");
    }

    #[tokio::test]
    async fn find_filters_by_equality() {
        let store = MemoryStore::new();
        let coll = store.collection("c");
        coll.insert_many(vec![
            doc! { "kind": "a", "n": 1 },
            doc! { "kind": "b", "n": 2 },
            doc! { "kind": "a", "n": 3 },
        ])
        .await
        .unwrap();

        let found: Vec<Document> = coll
            .find(doc! { "kind": "a" })
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(coll.count_documents(doc! {}).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn update_one_touches_a_single_document() {
        let store = MemoryStore::new();
        let coll = store.collection("c");
        coll.insert_many(vec![doc! { "k": 1 }, doc! { "k": 1 }])
            .await
            .unwrap();

        let matched = coll
            .update_one(doc! { "k": 1 }, doc! { "$set": { "k": 2 } })
            .await
            .unwrap();
        assert_eq!(matched, 1);
        assert_eq!(coll.count_documents(doc! { "k": 2 }).await.unwrap(), 1);

        let matched = coll
            .update_many(doc! { "k": 1 }, doc! { "$set": { "k": 2 } })
            .await
            .unwrap();
        assert_eq!(matched, 1);
        assert_eq!(coll.count_documents(doc! { "k": 2 }).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unique_index_rejects_duplicates_on_insert_and_update() {
        let store = MemoryStore::new();
        let coll = store.collection("master");
        coll.create_unique_index("name").await.unwrap();

        coll.insert_one(doc! { "name": "a" }).await.unwrap();
        coll.insert_one(doc! { "name": "b" }).await.unwrap();

        let err = coll.insert_one(doc! { "name": "a" }).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err = coll
            .update_one(doc! { "name": "b" }, doc! { "$set": { "name": "a" } })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(coll.count_documents(doc! { "name": "b" }).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn drop_removes_collection() {
        let store = MemoryStore::new();
        let coll = store.collection("org_gone");
        coll.insert_one(doc! { "x": 1 }).await.unwrap();
        assert!(store.contains_collection("org_gone"));

        coll.drop_collection().await.unwrap();
        assert!(!store.contains_collection("org_gone"));
        assert_eq!(coll.count_documents(doc! {}).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unsupported_operators_are_rejected() {
        let store = MemoryStore::new();
        let coll = store.collection("c");
        coll.insert_one(doc! { "n": 1 }).await.unwrap();

        let err = coll
            .update_one(doc! { "n": 1 }, doc! { "$inc": { "n": 1 } })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
