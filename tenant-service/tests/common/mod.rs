//! Shared setup for tenant-service integration tests: the full router over an
//! in-memory store and backup sink.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use service_core::config::Config as CommonConfig;
use std::sync::Arc;
use tenant_service::{
    build_router,
    config::{
        BackupConfig, Environment, JwtConfig, MongoConfig, SuperadminConfig, TenantConfig,
    },
    services::{MemoryBackupSink, MemoryStore, RegistryStore},
    AppState,
};
use tower::util::ServiceExt;

pub const SUPERADMIN_USERNAME: &str = "root";
pub const SUPERADMIN_PASSWORD: &str = "root-password";

pub fn test_config() -> TenantConfig {
    TenantConfig {
        common: CommonConfig { port: 0 },
        environment: Environment::Dev,
        service_name: "tenant-service-test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        mongodb: MongoConfig {
            uri: "mongodb://unused".to_string(),
            database: "unused".to_string(),
        },
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            algorithm: "HS256".to_string(),
            access_token_expiry_minutes: 15,
        },
        backup: BackupConfig {
            dir: "unused".to_string(),
            copy_batch_size: 2,
        },
        superadmin: SuperadminConfig {
            username: SUPERADMIN_USERNAME.to_string(),
            password: SUPERADMIN_PASSWORD.to_string(),
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: MemoryStore,
    pub backups: MemoryBackupSink,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let store = MemoryStore::new();
        let backups = MemoryBackupSink::new();

        RegistryStore::new(&store)
            .initialize_indexes()
            .await
            .expect("registry indexes");

        let state = AppState::new(
            test_config(),
            Arc::new(store.clone()),
            Arc::new(backups.clone()),
        )
        .expect("app state");

        Self {
            router: build_router(state.clone()),
            state,
            store,
            backups,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn create_org(&self, name: &str, email: &str, password: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/org/create",
            Some(serde_json::json!({
                "organization_name": name,
                "admin_email": email,
                "admin_password": password,
            })),
            None,
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/admin/login",
                Some(serde_json::json!({ "email": email, "password": password })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["access_token"]
            .as_str()
            .expect("access_token")
            .to_string()
    }

    pub async fn superadmin_token(&self) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/super/login",
                Some(serde_json::json!({
                    "username": SUPERADMIN_USERNAME,
                    "password": SUPERADMIN_PASSWORD,
                })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "superadmin login failed: {}", body);
        body["access_token"]
            .as_str()
            .expect("access_token")
            .to_string()
    }
}
