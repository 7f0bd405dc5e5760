//! Snapshots one storage unit to the backup directory, outside any request.
//!
//! ```text
//! backup-collection org_acme_corp
//! backup-collection org_acme_corp --backup-dir /var/backups/tenants
//! ```

use clap::Parser;
use std::sync::Arc;
use tenant_service::services::{BackupService, DocumentStore, LocalBackupSink, MongoStore};

#[derive(Parser, Debug)]
#[command(name = "backup-collection", version, about = "Write a JSON snapshot of a storage unit")]
struct Cli {
    /// Storage unit (collection) to snapshot, e.g. `org_acme_corp`.
    unit: String,

    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    mongodb_uri: String,

    #[arg(long, env = "MONGODB_DATABASE", default_value = "tenant_db")]
    database: String,

    #[arg(long, env = "BACKUP_DIR", default_value = "backups")]
    backup_dir: String,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    service_core::observability::init_tracing("backup-collection", &cli.log_level, None)?;

    let store: Arc<dyn DocumentStore> =
        Arc::new(MongoStore::connect(&cli.mongodb_uri, &cli.database).await?);
    let sink = Arc::new(LocalBackupSink::new(&cli.backup_dir).await?);

    let artifact = BackupService::new(store, sink).backup_unit(&cli.unit).await?;

    println!(
        "Backed up {} documents from {} to {}",
        artifact.document_count, cli.unit, artifact.location
    );
    Ok(())
}
