//! Point-in-time JSON snapshots of a storage unit, taken before any
//! destructive operation.

use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::store::DocumentStore;
use super::ServiceError;

/// Durable, write-once destination for backup artifacts.
#[async_trait]
pub trait BackupSink: Send + Sync {
    /// Persists `data` under `artifact_name` and returns its location.
    /// Must never overwrite an existing artifact.
    async fn write(&self, artifact_name: &str, data: Vec<u8>) -> Result<String, anyhow::Error>;
}

pub struct LocalBackupSink {
    base_path: PathBuf,
}

impl LocalBackupSink {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, anyhow::Error> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self { base_path })
    }
}

#[async_trait]
impl BackupSink for LocalBackupSink {
    async fn write(&self, artifact_name: &str, data: Vec<u8>) -> Result<String, anyhow::Error> {
        let path = self.base_path.join(format!("{}.json", artifact_name));
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", path.display(), e))?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        Ok(path.to_string_lossy().into_owned())
    }
}

/// Keeps artifacts in memory; locations are `memory://<name>`.
#[derive(Clone, Default)]
pub struct MemoryBackupSink {
    artifacts: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBackupSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, location: &str) -> Option<Vec<u8>> {
        self.artifacts
            .lock()
            .ok()
            .and_then(|artifacts| artifacts.get(location).cloned())
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BackupSink for MemoryBackupSink {
    async fn write(&self, artifact_name: &str, data: Vec<u8>) -> Result<String, anyhow::Error> {
        let location = format!("memory://{}", artifact_name);
        let mut artifacts = self
            .artifacts
            .lock()
            .map_err(|e| anyhow::anyhow!("Backup sink mutex poisoned: {}", e))?;
        if artifacts.contains_key(&location) {
            anyhow::bail!("Backup artifact {} already exists", location);
        }
        artifacts.insert(location.clone(), data);
        Ok(location)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackupArtifact {
    pub name: String,
    pub location: String,
    pub document_count: usize,
}

/// `<unit_id>_backup_<UTC timestamp>`; millisecond precision keeps two
/// snapshots of the same unit apart.
pub fn artifact_name(unit_id: &str) -> String {
    format!(
        "{}_backup_{}",
        unit_id,
        Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
    )
}

/// Renders a document as relaxed extended JSON with ObjectIds as plain hex.
fn to_json(document: Document) -> serde_json::Value {
    let stringified: Document = document
        .into_iter()
        .map(|(key, value)| match value {
            Bson::ObjectId(oid) => (key, Bson::String(oid.to_hex())),
            other => (key, other),
        })
        .collect();
    Bson::Document(stringified).into_relaxed_extjson()
}

#[derive(Clone)]
pub struct BackupService {
    store: Arc<dyn DocumentStore>,
    sink: Arc<dyn BackupSink>,
}

impl BackupService {
    pub fn new(store: Arc<dyn DocumentStore>, sink: Arc<dyn BackupSink>) -> Self {
        Self { store, sink }
    }

    /// Reads the whole unit into memory, serializes it, and writes one artifact.
    pub async fn backup_unit(&self, unit_id: &str) -> Result<BackupArtifact, ServiceError> {
        let documents: Vec<serde_json::Value> = self
            .store
            .collection(unit_id)
            .find(doc! {})
            .await?
            .map_ok(to_json)
            .try_collect()
            .await?;

        let document_count = documents.len();
        let data = serde_json::to_vec_pretty(&documents)
            .map_err(|e| ServiceError::Backup(anyhow::anyhow!("Failed to serialize: {}", e)))?;
        let bytes = data.len();

        let name = artifact_name(unit_id);
        let location = self.sink.write(&name, data).await.map_err(|e| {
            tracing::error!(storage_unit = %unit_id, "Backup write failed: {}", e);
            ServiceError::Backup(e)
        })?;

        metrics::counter!("tenant_backup_bytes_total").increment(bytes as u64);
        tracing::info!(
            storage_unit = %unit_id,
            backup_location = %location,
            documents = document_count,
            "Storage unit backed up"
        );

        Ok(BackupArtifact {
            name,
            location,
            document_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemoryStore;
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn artifact_name_follows_convention() {
        let name = artifact_name("org_acme");
        let ts = name.strip_prefix("org_acme_backup_").expect("prefix");
        assert!(ts.ends_with('Z'));
        assert!(chrono::NaiveDateTime::parse_from_str(ts, "%Y%m%dT%H%M%S%.3fZ").is_ok());
    }

    #[test]
    fn object_ids_are_rendered_as_hex() {
        let oid = ObjectId::new();
        let json = to_json(doc! { "_id": oid, "email": "a@x.com" });
        assert_eq!(json["_id"], oid.to_hex());
        assert_eq!(json["email"], "a@x.com");
    }

    #[tokio::test]
    async fn snapshot_contains_every_document() {
        let store = MemoryStore::new();
        let sink = MemoryBackupSink::new();
        let coll = store.collection("org_acme");
        coll.insert_many(vec![doc! { "n": 1 }, doc! { "n": 2 }, doc! { "n": 3 }])
            .await
            .unwrap();

        let service = BackupService::new(Arc::new(store), Arc::new(sink.clone()));
        let artifact = service.backup_unit("org_acme").await.unwrap();

        assert_eq!(artifact.document_count, 3);
        assert!(artifact.location.starts_with("memory://org_acme_backup_"));

        let body: Vec<serde_json::Value> =
            serde_json::from_slice(&sink.get(&artifact.location).unwrap()).unwrap();
        let ns: Vec<i64> = body.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn local_sink_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalBackupSink::new(dir.path()).await.unwrap();

        let location = sink.write("org_a_backup_x", b"[]".to_vec()).await.unwrap();
        assert!(location.ends_with("org_a_backup_x.json"));
        assert_eq!(std::fs::read(&location).unwrap(), b"[]");

        assert!(sink.write("org_a_backup_x", b"[1]".to_vec()).await.is_err());
        assert_eq!(std::fs::read(&location).unwrap(), b"[]");
    }

    struct FailingSink;

    #[async_trait]
    impl BackupSink for FailingSink {
        async fn write(&self, _: &str, _: Vec<u8>) -> Result<String, anyhow::Error> {
            anyhow::bail!("disk full")
        }
    }

    #[tokio::test]
    async fn sink_failure_is_a_backup_error() {
        let service = BackupService::new(Arc::new(MemoryStore::new()), Arc::new(FailingSink));
        let err = service.backup_unit("org_x").await.unwrap_err();
        assert!(matches!(err, ServiceError::Backup(_)));
    }
}
