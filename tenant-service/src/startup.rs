use service_core::error::AppError;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::TenantConfig;
use crate::services::{BackupSink, DocumentStore, LocalBackupSink, MongoStore, RegistryStore};
use crate::{build_router, AppState};

pub struct Application {
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
}

impl Application {
    /// Connects the store, ensures registry indexes, opens the backup
    /// directory and binds the listener.
    pub async fn build(config: TenantConfig) -> Result<Self, AppError> {
        let store = MongoStore::connect(&config.mongodb.uri, &config.mongodb.database).await?;
        let store: Arc<dyn DocumentStore> = Arc::new(store);

        RegistryStore::new(store.as_ref())
            .initialize_indexes()
            .await
            .map_err(|e| {
                tracing::error!("Failed to initialize registry indexes: {}", e);
                AppError::from(e)
            })?;

        let sink: Arc<dyn BackupSink> =
            Arc::new(LocalBackupSink::new(&config.backup.dir).await.map_err(|e| {
                tracing::error!(
                    "Failed to initialize backup directory at {}: {}",
                    config.backup.dir,
                    e
                );
                AppError::ConfigError(e)
            })?);

        let port = config.common.port;
        let state = AppState::new(config, store, sink).map_err(AppError::ConfigError)?;
        let app = build_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .into_future();

        Ok(Self {
            server: Box::new(Box::pin(server)),
        })
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
