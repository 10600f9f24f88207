//! Authentication facade used by resource dispatch.
//!
//! Provides:
//! - The [`AuthenticatorTrait`] seam resources authenticate through
//! - JWT token verification (HS256/RS256)
//! - A configurable test authenticator
//! - Authentication context and error types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

// ============================================================================
// Authentication Context
// ============================================================================

/// Scope carried by contexts built for requests without credentials.
pub const ANONYMOUS_SCOPE: &str = "anonymous";

/// Captures the outcome of an authentication attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Option<Uuid>,
    pub scopes: Vec<String>,
    pub metadata: Value,
}

impl AuthContext {
    #[inline]
    pub fn new(user_id: Option<Uuid>, scopes: Vec<String>, metadata: Value) -> Self {
        Self {
            user_id,
            scopes,
            metadata,
        }
    }

    /// Helper for requests that carried no credentials.
    #[inline]
    pub fn anonymous() -> Self {
        Self::new(None, vec![ANONYMOUS_SCOPE.into()], Value::Null)
    }

    /// True when the context came from actual credentials.
    #[inline]
    pub fn is_authenticated(&self) -> bool {
        !self.is_anonymous()
    }

    #[inline]
    pub fn is_anonymous(&self) -> bool {
        self.has_scope(ANONYMOUS_SCOPE)
    }

    #[inline]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.has_scope("admin")
    }

    /// Stable key for per-caller bookkeeping such as throttling.
    pub fn identifier(&self) -> Option<String> {
        self.user_id.map(|id| id.to_string())
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Authentication errors that can surface during request processing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("authentication required")]
    MissingCredentials,
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("token expired")]
    TokenExpired,
    #[error("authentication subsystem is unavailable: {0}")]
    Subsystem(String),
}

// ============================================================================
// Authenticator Trait
// ============================================================================

/// Trait for authentication backends. Implement this for production and test authenticators.
///
/// `None` means the request carried no credentials. Implementations return an
/// anonymous context in that case and leave the decision to the caller.
#[async_trait::async_trait]
pub trait AuthenticatorTrait: Send + Sync + 'static {
    async fn authenticate(&self, token: Option<&str>) -> Result<AuthContext, AuthError>;
}

// ============================================================================
// Test Authenticator
// ============================================================================

/// Test-only authenticator with a fixed outcome.
#[derive(Debug, Default)]
pub struct TestAuthenticator {
    pub scopes: Vec<String>,
    pub user_id: Option<Uuid>,
    pub reject: bool,
}

impl TestAuthenticator {
    pub fn new_with(scopes: Vec<String>, user_id: Option<Uuid>) -> Self {
        Self {
            scopes,
            user_id,
            reject: false,
        }
    }

    pub fn user(user_id: Uuid) -> Self {
        Self::new_with(vec!["user".into()], Some(user_id))
    }

    pub fn admin() -> Self {
        Self::new_with(vec!["admin".into(), "user".into()], Some(Uuid::new_v4()))
    }

    /// Authenticator that refuses every request.
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl AuthenticatorTrait for TestAuthenticator {
    async fn authenticate(&self, _token: Option<&str>) -> Result<AuthContext, AuthError> {
        if self.reject {
            return Err(AuthError::AuthenticationFailed);
        }
        Ok(AuthContext::new(
            self.user_id,
            self.scopes.clone(),
            Value::Null,
        ))
    }
}

/// Lets every request through as anonymous, whatever it carries.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAnonymousAuthenticator;

#[async_trait::async_trait]
impl AuthenticatorTrait for AllowAnonymousAuthenticator {
    async fn authenticate(&self, _token: Option<&str>) -> Result<AuthContext, AuthError> {
        Ok(AuthContext::anonymous())
    }
}

// ============================================================================
// JWT Authenticator
// ============================================================================

/// JWT verification options. Supports HS256 (shared secret) and RS256 (RSA public key PEM).
#[derive(Debug, Clone)]
pub enum JwtKey {
    /// HMAC-SHA256 shared secret
    Hs256(String),
    /// PEM-encoded RSA public key
    Rs256(String),
}

/// JWT-based authenticator supporting HS256 and RS256 algorithms.
#[derive(Debug, Clone)]
pub struct JwtAuthenticator {
    key: JwtKey,
    /// Grace period in seconds for token expiration (default: 60)
    exp_grace_seconds: u64,
}

impl JwtAuthenticator {
    pub fn new_hs256(secret: impl Into<String>) -> Self {
        Self {
            key: JwtKey::Hs256(secret.into()),
            exp_grace_seconds: 60,
        }
    }

    pub fn new_rs256(pem_public_key: impl Into<String>) -> Self {
        Self {
            key: JwtKey::Rs256(pem_public_key.into()),
            exp_grace_seconds: 60,
        }
    }

    pub fn with_exp_grace(mut self, seconds: u64) -> Self {
        self.exp_grace_seconds = seconds;
        self
    }

    fn process_claims(&self, claims: Claims) -> Result<AuthContext, AuthError> {
        if let Some(exp) = claims.exp {
            let now = chrono::Utc::now().timestamp() as u64;
            if exp < now.saturating_sub(self.exp_grace_seconds) {
                return Err(AuthError::TokenExpired);
            }
        }

        let sub = claims.sub.and_then(|s| Uuid::parse_str(&s).ok());
        let scopes = match (claims.scope, claims.scopes) {
            (Some(s), _) => s.split_whitespace().map(String::from).collect(),
            (_, Some(arr)) => arr,
            _ => vec!["user".into()],
        };

        Ok(AuthContext::new(sub, scopes, Value::Null))
    }

    /// Strip the "Bearer " prefix from a token if present.
    #[inline]
    fn strip_bearer(token: &str) -> &str {
        let token = token.trim();
        if token.len() > 7 && token[..7].eq_ignore_ascii_case("bearer ") {
            &token[7..]
        } else {
            token
        }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
    exp: Option<u64>,
    /// Space-separated scope string (OAuth2 style)
    scope: Option<String>,
    scopes: Option<Vec<String>>,
}

#[async_trait::async_trait]
impl AuthenticatorTrait for JwtAuthenticator {
    async fn authenticate(&self, token: Option<&str>) -> Result<AuthContext, AuthError> {
        let token = match token {
            Some(t) if !t.trim().is_empty() => Self::strip_bearer(t),
            _ => return Ok(AuthContext::anonymous()),
        };

        use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

        let (decoding, algorithm) = match &self.key {
            JwtKey::Hs256(secret) => (
                DecodingKey::from_secret(secret.as_bytes()),
                Algorithm::HS256,
            ),
            JwtKey::Rs256(pem) => {
                let key = DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|_| AuthError::Subsystem("invalid RSA public key".into()))?;
                (key, Algorithm::RS256)
            }
        };

        let mut validation = Validation::new(algorithm);
        // exp is checked in process_claims so the grace period applies
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(token, &decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt decode failed");
            AuthError::AuthenticationFailed
        })?;

        self.process_claims(data.claims)
    }
}
