//! Maps a bearer token to a tenant context or a superadmin identity.
//!
//! Tenant resolution walks [`REGISTRY_STRATEGIES`] in order and keeps the first
//! registry hit. Claims are frozen at issue time while the registry keeps
//! changing (renames, email updates), so several keys are tried; the price is
//! that a stale token can resolve through a weaker key.

use mongodb::bson::{self, doc, oid::ObjectId};
use std::sync::Arc;

use super::jwt::{Claims, TokenService, ROLE_SUPERADMIN};
use super::registry::{RegistryKey, RegistryStore};
use super::store::DocumentStore;
use super::ServiceError;
use crate::models::{AdminRecord, RegistryEntry};

/// A pure mapping from claims to the registry key it would look up.
pub type RegistryStrategy = fn(&Claims) -> Option<RegistryKey>;

pub fn by_organization_name(claims: &Claims) -> Option<RegistryKey> {
    claims
        .get_str("organization_name")
        .map(|name| RegistryKey::OrganizationName(name.to_string()))
}

pub fn by_admin_email(claims: &Claims) -> Option<RegistryKey> {
    claims
        .get_str("admin_email")
        .map(|email| RegistryKey::AdminEmail(email.to_string()))
}

pub fn by_admin_id(claims: &Claims) -> Option<RegistryKey> {
    claims
        .get_str("admin_id")
        .and_then(|id| ObjectId::parse_str(id).ok())
        .map(RegistryKey::AdminId)
}

pub const REGISTRY_STRATEGIES: [(&str, RegistryStrategy); 3] = [
    ("organization_name", by_organization_name),
    ("admin_email", by_admin_email),
    ("admin_id", by_admin_id),
];

/// Tenant context a resolved tenant-admin token grants.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub admin: AdminRecord,
    pub entry: RegistryEntry,
}

#[derive(Clone)]
pub struct AccessResolver {
    store: Arc<dyn DocumentStore>,
    registry: RegistryStore,
    tokens: TokenService,
}

impl AccessResolver {
    pub fn new(store: Arc<dyn DocumentStore>, registry: RegistryStore, tokens: TokenService) -> Self {
        Self {
            store,
            registry,
            tokens,
        }
    }

    pub async fn resolve_tenant_admin(&self, token: &str) -> Result<TenantContext, ServiceError> {
        let claims = self.tokens.verify(token).map_err(|e| {
            tracing::debug!("Tenant token rejected: {}", e);
            ServiceError::Unauthorized
        })?;

        if claims.get_str("organization_name").is_none() && claims.get_str("admin_email").is_none()
        {
            return Err(ServiceError::Unauthorized);
        }

        let entry = self
            .resolve_entry(&claims)
            .await?
            .ok_or(ServiceError::Unauthorized)?;

        let admin = self
            .resolve_admin(&claims, &entry)
            .await?
            .ok_or(ServiceError::Unauthorized)?;

        Ok(TenantContext { admin, entry })
    }

    pub fn resolve_superadmin(&self, token: &str) -> Result<Claims, ServiceError> {
        let claims = self.tokens.verify(token).map_err(|e| {
            tracing::debug!("Superadmin token rejected: {}", e);
            ServiceError::Forbidden
        })?;

        if claims.role() != Some(ROLE_SUPERADMIN) {
            return Err(ServiceError::Forbidden);
        }
        Ok(claims)
    }

    async fn resolve_entry(&self, claims: &Claims) -> Result<Option<RegistryEntry>, ServiceError> {
        for (label, strategy) in REGISTRY_STRATEGIES {
            let Some(key) = strategy(claims) else {
                continue;
            };
            if let Some(entry) = self.registry.find(&key).await? {
                tracing::debug!(
                    strategy = label,
                    organization = %entry.organization_name,
                    "Resolved registry entry"
                );
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Identity-key match on `admin_id` first, then email.
    async fn resolve_admin(
        &self,
        claims: &Claims,
        entry: &RegistryEntry,
    ) -> Result<Option<AdminRecord>, ServiceError> {
        let unit = self.store.collection(&entry.storage_unit_id);

        if let Some(id) = claims
            .get_str("admin_id")
            .and_then(|id| ObjectId::parse_str(id).ok())
        {
            if let Some(found) = unit.find_one(doc! { "_id": id }).await? {
                return Ok(Some(bson::from_document(found)?));
            }
        }

        if let Some(email) = claims.get_str("admin_email") {
            if let Some(found) = unit.find_one(doc! { "email": email }).await? {
                return Ok(Some(bson::from_document(found)?));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::services::jwt::{org_admin_claims, superadmin_claims};
    use crate::services::MemoryStore;
    use chrono::Duration;
    use serde_json::{Map, Value};

    fn claims_with(pairs: &[(&str, &str)]) -> Claims {
        let extra: Map<String, Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect();
        Claims {
            sub: "s".into(),
            exp: 0,
            extra,
        }
    }

    #[test]
    fn each_strategy_reads_only_its_claim() {
        let oid = ObjectId::new();
        let hex = oid.to_hex();
        let claims = claims_with(&[
            ("organization_name", "acme"),
            ("admin_email", "a@x.com"),
            ("admin_id", hex.as_str()),
        ]);

        assert_eq!(
            by_organization_name(&claims),
            Some(RegistryKey::OrganizationName("acme".into()))
        );
        assert_eq!(
            by_admin_email(&claims),
            Some(RegistryKey::AdminEmail("a@x.com".into()))
        );
        assert_eq!(by_admin_id(&claims), Some(RegistryKey::AdminId(oid)));

        let empty = claims_with(&[]);
        for (_, strategy) in REGISTRY_STRATEGIES {
            assert_eq!(strategy(&empty), None);
        }
    }

    #[test]
    fn malformed_admin_id_yields_no_key() {
        let claims = claims_with(&[("admin_id", "not-an-object-id")]);
        assert_eq!(by_admin_id(&claims), None);
    }

    #[test]
    fn strategies_run_in_fixed_order() {
        let labels: Vec<&str> = REGISTRY_STRATEGIES.iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, ["organization_name", "admin_email", "admin_id"]);
    }

    struct Fixture {
        resolver: AccessResolver,
        tokens: TokenService,
        registry: RegistryStore,
        admin_id: ObjectId,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let registry = RegistryStore::new(&store);
        let tokens = TokenService::new(&JwtConfig {
            secret: "resolver-secret".into(),
            algorithm: "HS256".into(),
            access_token_expiry_minutes: 5,
        })
        .unwrap();

        let admin = AdminRecord::new("a@x.com".into(), "digest".into());
        let admin_id = store
            .collection("org_acme")
            .insert_one(bson::to_document(&admin).unwrap())
            .await
            .unwrap()
            .as_object_id()
            .unwrap();
        registry
            .insert(&RegistryEntry::new("acme".into(), admin_id, "a@x.com".into()))
            .await
            .unwrap();

        Fixture {
            resolver: AccessResolver::new(Arc::new(store), registry.clone(), tokens.clone()),
            tokens,
            registry,
            admin_id,
        }
    }

    #[tokio::test]
    async fn resolves_by_organization_name() {
        let f = fixture().await;
        let token = f
            .tokens
            .issue(
                &f.admin_id.to_hex(),
                org_admin_claims(&f.admin_id.to_hex(), "acme", "a@x.com"),
                None,
            )
            .unwrap();

        let ctx = f.resolver.resolve_tenant_admin(&token).await.unwrap();
        assert_eq!(ctx.entry.organization_name, "acme");
        assert_eq!(ctx.admin.id, Some(f.admin_id));
        assert_eq!(ctx.admin.email, "a@x.com");
    }

    #[tokio::test]
    async fn stale_name_falls_back_to_email() {
        let f = fixture().await;
        let token = f
            .tokens
            .issue(
                "s",
                org_admin_claims(&f.admin_id.to_hex(), "renamed_away", "a@x.com"),
                None,
            )
            .unwrap();

        let ctx = f.resolver.resolve_tenant_admin(&token).await.unwrap();
        assert_eq!(ctx.entry.organization_name, "acme");
    }

    #[tokio::test]
    async fn stale_name_and_email_fall_back_to_admin_id() {
        let f = fixture().await;
        let token = f
            .tokens
            .issue(
                "s",
                org_admin_claims(&f.admin_id.to_hex(), "old_name", "old@x.com"),
                None,
            )
            .unwrap();

        let ctx = f.resolver.resolve_tenant_admin(&token).await.unwrap();
        assert_eq!(ctx.entry.organization_name, "acme");
        assert_eq!(ctx.admin.id, Some(f.admin_id));
    }

    #[tokio::test]
    async fn admin_record_falls_back_to_email_match() {
        let f = fixture().await;
        let mut claims = Map::new();
        claims.insert("organization_name".into(), Value::from("acme"));
        claims.insert("admin_email".into(), Value::from("a@x.com"));
        let token = f.tokens.issue("s", claims, None).unwrap();

        let ctx = f.resolver.resolve_tenant_admin(&token).await.unwrap();
        assert_eq!(ctx.admin.id, Some(f.admin_id));
    }

    #[tokio::test]
    async fn claims_without_name_or_email_are_unauthorized() {
        let f = fixture().await;
        let mut claims = Map::new();
        claims.insert("admin_id".into(), Value::from(f.admin_id.to_hex()));
        let token = f.tokens.issue("s", claims, None).unwrap();

        let err = f.resolver.resolve_tenant_admin(&token).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized));
    }

    #[tokio::test]
    async fn unknown_tenant_is_unauthorized() {
        let f = fixture().await;
        let token = f
            .tokens
            .issue(
                "s",
                org_admin_claims(&ObjectId::new().to_hex(), "ghost", "g@x.com"),
                None,
            )
            .unwrap();

        let err = f.resolver.resolve_tenant_admin(&token).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized));
    }

    #[tokio::test]
    async fn missing_admin_record_is_unauthorized() {
        let f = fixture().await;
        f.registry
            .update_fields("acme", doc! { "storage_unit_id": "org_empty" })
            .await
            .unwrap();
        let token = f
            .tokens
            .issue(
                "s",
                org_admin_claims(&f.admin_id.to_hex(), "acme", "a@x.com"),
                None,
            )
            .unwrap();

        let err = f.resolver.resolve_tenant_admin(&token).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized));
    }

    #[tokio::test]
    async fn expired_or_forged_tokens_are_unauthorized() {
        let f = fixture().await;
        let expired = f
            .tokens
            .issue(
                "s",
                org_admin_claims(&f.admin_id.to_hex(), "acme", "a@x.com"),
                Some(Duration::seconds(-1)),
            )
            .unwrap();

        for token in [expired.as_str(), "garbage"] {
            let err = f.resolver.resolve_tenant_admin(token).await.unwrap_err();
            assert!(matches!(err, ServiceError::Unauthorized));
        }
    }

    #[tokio::test]
    async fn superadmin_requires_role_claim() {
        let f = fixture().await;
        let root = f.tokens.issue("root", superadmin_claims("root"), None).unwrap();
        let claims = f.resolver.resolve_superadmin(&root).unwrap();
        assert_eq!(claims.get_str("username"), Some("root"));

        let tenant = f
            .tokens
            .issue(
                "s",
                org_admin_claims(&f.admin_id.to_hex(), "acme", "a@x.com"),
                None,
            )
            .unwrap();
        for token in [tenant.as_str(), "garbage"] {
            let err = f.resolver.resolve_superadmin(token).unwrap_err();
            assert!(matches!(err, ServiceError::Forbidden));
        }
    }
}
