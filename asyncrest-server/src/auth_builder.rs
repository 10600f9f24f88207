use std::sync::Arc;

use asyncrest_auth::{AllowAnonymousAuthenticator, AuthenticatorTrait, JwtAuthenticator};
use asyncrest_config::Config;

/// Metadata about the configured authentication for logging purposes.
#[derive(Debug)]
pub struct AuthKeyInfo {
    pub mode: String,
    pub key_type: Option<String>,
}

/// Result of building an authenticator: the trait object and associated metadata.
pub type AuthResult = Result<(Arc<dyn AuthenticatorTrait>, AuthKeyInfo), String>;

/// Build authenticator from config.
///
/// Tries the inline PEM, the PEM path, then the HS256 secret. Without any of
/// them the server only starts when anonymous access is allowed.
pub fn build_authenticator_from_config(cfg: &Config) -> AuthResult {
    if let Some(ref pem_inline) = cfg.auth.jwt_pem {
        return build_rs256_auth(pem_inline.clone(), "RS256(inline)".into());
    }

    if let Some(ref pem_path) = cfg.auth.jwt_pem_path {
        let pem_content = std::fs::read_to_string(pem_path)
            .map_err(|e| format!("failed to read jwt_pem_path '{pem_path}': {e}"))?;
        return build_rs256_auth(pem_content, format!("RS256(path={pem_path})"));
    }

    if let Some(ref secret) = cfg.auth.jwt_secret {
        if secret.is_empty() {
            return Err("jwt_secret must not be empty".into());
        }
        let auth: Arc<dyn AuthenticatorTrait> = Arc::new(JwtAuthenticator::new_hs256(secret.clone()));
        return Ok((
            auth,
            AuthKeyInfo {
                mode: "HS256(secret)".into(),
                key_type: Some("HS256".into()),
            },
        ));
    }

    if cfg.auth.allow_anonymous {
        let auth: Arc<dyn AuthenticatorTrait> = Arc::new(AllowAnonymousAuthenticator);
        return Ok((
            auth,
            AuthKeyInfo {
                mode: "anonymous".into(),
                key_type: None,
            },
        ));
    }

    Err(
        "no JWT configuration found: set ASYNCREST_JWT_PEM, ASYNCREST_JWT_PEM_PATH or ASYNCREST_JWT_SECRET"
            .into(),
    )
}

fn build_rs256_auth(pem_content: String, mode: String) -> AuthResult {
    if !pem_content.contains("-----BEGIN") {
        return Err("jwt_pem does not look like a PEM document".into());
    }
    let auth: Arc<dyn AuthenticatorTrait> = Arc::new(JwtAuthenticator::new_rs256(pem_content));
    Ok((
        auth,
        AuthKeyInfo {
            mode,
            key_type: Some("RSA".into()),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_then_anonymous_then_error() {
        let mut cfg = Config::default();
        assert!(build_authenticator_from_config(&cfg).is_err());

        cfg.auth.allow_anonymous = true;
        let (_, info) = build_authenticator_from_config(&cfg).unwrap();
        assert_eq!(info.mode, "anonymous");

        cfg.auth.jwt_secret = Some("s3cret".into());
        let (_, info) = build_authenticator_from_config(&cfg).unwrap();
        assert_eq!(info.key_type.as_deref(), Some("HS256"));
    }

    #[test]
    fn missing_pem_file_is_reported() {
        let mut cfg = Config::default();
        cfg.auth.jwt_pem_path = Some("/nonexistent/key.pem".into());
        let err = build_authenticator_from_config(&cfg).err().unwrap();
        assert!(err.contains("/nonexistent/key.pem"));
    }
}
