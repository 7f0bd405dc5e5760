use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ServiceError;
use crate::config::JwtConfig;

pub const ROLE_ORG_ADMIN: &str = "org_admin";
pub const ROLE_SUPERADMIN: &str = "superadmin";

/// Decoded token payload: the registered `sub`/`exp` pair plus whatever claim
/// set the issuer attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// String claim by name; non-string and empty values read as absent.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.extra
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn role(&self) -> Option<&str> {
        self.get_str("role")
    }
}

/// Claim set for a tenant-admin token.
pub fn org_admin_claims(
    admin_id: &str,
    organization_name: &str,
    admin_email: &str,
) -> Map<String, Value> {
    let mut claims = Map::new();
    claims.insert("admin_id".into(), Value::from(admin_id));
    claims.insert("organization_name".into(), Value::from(organization_name));
    claims.insert("admin_email".into(), Value::from(admin_email));
    claims.insert("role".into(), Value::from(ROLE_ORG_ADMIN));
    claims
}

/// Claim set for a superadmin token.
pub fn superadmin_claims(username: &str) -> Map<String, Value> {
    let mut claims = Map::new();
    claims.insert("role".into(), Value::from(ROLE_SUPERADMIN));
    claims.insert("username".into(), Value::from(username));
    claims
}

/// Issues and verifies HMAC-signed bearer tokens. Stateless: nothing is
/// stored server-side and tokens die only by expiry.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    default_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        let algorithm: Algorithm = config
            .algorithm
            .parse()
            .map_err(|e| anyhow::anyhow!("Unknown JWT algorithm {}: {}", config.algorithm, e))?;

        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            anyhow::bail!(
                "JWT algorithm {:?} is not supported with a shared secret",
                algorithm
            );
        }
        if config.secret.is_empty() {
            anyhow::bail!("JWT secret must not be empty");
        }
        let default_ttl = Duration::try_minutes(config.access_token_expiry_minutes)
            .filter(|ttl| *ttl > Duration::zero())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Access token expiry of {} minutes is out of range",
                    config.access_token_expiry_minutes
                )
            })?;

        tracing::info!(algorithm = ?algorithm, "Token service initialized");

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            algorithm,
            default_ttl,
        })
    }

    /// Signs `claims ∪ {sub, exp = now + ttl}`; `ttl` falls back to the
    /// configured default.
    pub fn issue(
        &self,
        subject: &str,
        claims: Map<String, Value>,
        ttl: Option<Duration>,
    ) -> Result<String, ServiceError> {
        let exp = Utc::now()
            .checked_add_signed(ttl.unwrap_or(self.default_ttl))
            .ok_or_else(|| ServiceError::Internal(anyhow::anyhow!("Token expiry is out of range")))?;
        let payload = Claims {
            sub: subject.to_string(),
            exp: exp.timestamp(),
            extra: claims,
        };

        encode(&Header::new(self.algorithm), &payload, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))
    }

    /// Checks signature and expiry only; claim shape is left to the caller.
    pub fn verify(&self, token: &str) -> Result<Claims, ServiceError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => ServiceError::TokenExpired,
                _ => {
                    tracing::debug!("Token rejected: {}", e);
                    ServiceError::InvalidToken
                }
            })
    }
}
