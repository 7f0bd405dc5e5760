//! Document-store capability the tenant core runs against.
//!
//! The core only ever sees [`DocumentStore`] and [`UnitCollection`]; the
//! MongoDB driver is one implementation, [`super::MemoryStore`] another.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use mongodb::{
    bson::{doc, Bson, Document},
    options::IndexOptions,
    Client as MongoClient, Collection, Database, IndexModel,
};
use std::sync::Arc;

use super::ServiceError;

pub type DocumentStream = BoxStream<'static, Result<Document, ServiceError>>;

/// Async CRUD over one named collection (a tenant storage unit or the registry).
///
/// Filters are top-level equality matches; patches are `$set` documents.
#[async_trait]
pub trait UnitCollection: Send + Sync {
    fn name(&self) -> &str;

    async fn find_one(&self, filter: Document) -> Result<Option<Document>, ServiceError>;

    async fn find(&self, filter: Document) -> Result<DocumentStream, ServiceError>;

    /// Returns the identity key assigned to the inserted document.
    async fn insert_one(&self, document: Document) -> Result<Bson, ServiceError>;

    /// Returns how many documents were written.
    async fn insert_many(&self, documents: Vec<Document>) -> Result<usize, ServiceError>;

    /// Returns the matched count.
    async fn update_one(&self, filter: Document, patch: Document) -> Result<u64, ServiceError>;

    /// Returns the matched count.
    async fn update_many(&self, filter: Document, patch: Document) -> Result<u64, ServiceError>;

    /// Returns the deleted count.
    async fn delete_one(&self, filter: Document) -> Result<u64, ServiceError>;

    async fn count_documents(&self, filter: Document) -> Result<u64, ServiceError>;

    /// Removes the whole collection. Dropping an absent collection succeeds.
    async fn drop_collection(&self) -> Result<(), ServiceError>;

    /// Writes violating the index fail with [`ServiceError::Conflict`].
    async fn create_unique_index(&self, field: &str) -> Result<(), ServiceError>;
}

/// Handle to the shared database, constructed once at startup and injected.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn collection(&self, name: &str) -> Arc<dyn UnitCollection>;

    async fn health_check(&self) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, ServiceError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            ServiceError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn collection(&self, name: &str) -> Arc<dyn UnitCollection> {
        Arc::new(MongoCollection {
            name: name.to_string(),
            inner: self.db.collection::<Document>(name),
        })
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                ServiceError::StorageUnavailable
            })?;
        Ok(())
    }
}

struct MongoCollection {
    name: String,
    inner: Collection<Document>,
}

#[async_trait]
impl UnitCollection for MongoCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_one(&self, filter: Document) -> Result<Option<Document>, ServiceError> {
        Ok(self.inner.find_one(filter, None).await?)
    }

    async fn find(&self, filter: Document) -> Result<DocumentStream, ServiceError> {
        let cursor = self.inner.find(filter, None).await?;
        Ok(cursor.map_err(ServiceError::from).boxed())
    }

    async fn insert_one(&self, document: Document) -> Result<Bson, ServiceError> {
        let result = self.inner.insert_one(document, None).await?;
        Ok(result.inserted_id)
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<usize, ServiceError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let result = self.inner.insert_many(documents, None).await?;
        Ok(result.inserted_ids.len())
    }

    async fn update_one(&self, filter: Document, patch: Document) -> Result<u64, ServiceError> {
        let result = self.inner.update_one(filter, patch, None).await?;
        Ok(result.matched_count)
    }

    async fn update_many(&self, filter: Document, patch: Document) -> Result<u64, ServiceError> {
        let result = self.inner.update_many(filter, patch, None).await?;
        Ok(result.matched_count)
    }

    async fn delete_one(&self, filter: Document) -> Result<u64, ServiceError> {
        let result = self.inner.delete_one(filter, None).await?;
        Ok(result.deleted_count)
    }

    async fn count_documents(&self, filter: Document) -> Result<u64, ServiceError> {
        Ok(self.inner.count_documents(filter, None).await?)
    }

    async fn drop_collection(&self) -> Result<(), ServiceError> {
        self.inner.drop(None).await?;
        Ok(())
    }

    async fn create_unique_index(&self, field: &str) -> Result<(), ServiceError> {
        let mut keys = Document::new();
        keys.insert(field, 1);

        let index = IndexModel::builder()
            .keys(keys)
            .options(
                IndexOptions::builder()
                    .name(format!("{}_unique", field))
                    .unique(true)
                    .build(),
            )
            .build();

        self.inner.create_index(index, None).await.map_err(|e| {
            tracing::error!(
                collection = %self.name,
                field = %field,
                "Failed to create unique index: {}",
                e
            );
            ServiceError::from(e)
        })?;
        tracing::info!(collection = %self.name, field = %field, "Ensured unique index");
        Ok(())
    }
}
