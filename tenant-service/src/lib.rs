//! tenant-service: multi-tenant organization registry.
//!
//! Each organization owns one storage unit (`org_<name>`) in a shared
//! database, found through the master registry. Destructive lifecycle
//! operations are backed up first; renames copy, verify and swap.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use service_core::middleware::{metrics_middleware, request_id_middleware};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::TenantConfig;
use crate::services::{
    AccessResolver, AdminService, AuthService, BackupService, BackupSink, DocumentStore,
    RegistryStore, TenantManager, TokenService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TenantConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub tenants: TenantManager,
    pub auth: AuthService,
    pub admin: AdminService,
    pub resolver: AccessResolver,
}

impl AppState {
    /// Wires every service around one injected store handle and backup sink.
    pub fn new(
        config: TenantConfig,
        store: Arc<dyn DocumentStore>,
        sink: Arc<dyn BackupSink>,
    ) -> Result<Self, anyhow::Error> {
        let tokens = TokenService::new(&config.jwt)?;
        let registry = RegistryStore::new(store.as_ref());
        let backups = BackupService::new(store.clone(), sink);

        let tenants = TenantManager::new(store.clone(), registry.clone(), backups)
            .with_copy_batch_size(config.backup.copy_batch_size);
        let auth = AuthService::new(
            store.clone(),
            registry.clone(),
            tokens.clone(),
            config.superadmin.clone(),
        );
        let resolver = AccessResolver::new(store.clone(), registry, tokens);
        let admin = AdminService::new(tenants.clone());

        Ok(Self {
            config: Arc::new(config),
            store,
            tenants,
            auth,
            admin,
            resolver,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let org_routes = Router::new()
        .route("/create", post(handlers::create_org))
        .route("/get", get(handlers::get_org))
        .route("/update", put(handlers::update_org))
        .route("/delete", delete(handlers::delete_org));

    let admin_routes = Router::new()
        .route("/login", post(handlers::admin_login))
        .route("/master-list", get(handlers::master_list))
        .route("/update-org/:name", put(handlers::update_org_by_name))
        .route("/delete-org/:name", delete(handlers::delete_org_by_name));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route("/super/login", post(handlers::super_login))
        .nest("/org", org_routes)
        .nest("/admin", admin_routes)
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
