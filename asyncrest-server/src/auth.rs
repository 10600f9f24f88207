use asyncrest_auth::{AuthContext, AuthError};
use axum::http::HeaderMap;
use tracing::debug;

use crate::{error::ApiError, state::AppState};

/// Session cookie name used for authentication.
pub const SESSION_COOKIE_NAME: &str = "asyncrest_session";

/// Extract authentication token from headers.
/// Checks Authorization header first, then falls back to session cookie.
/// Returns the token in "Bearer <token>" format for use with the authenticator.
pub fn extract_auth_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
    {
        return Some(auth_header.to_string());
    }

    extract_session_cookie(headers).map(|token| format!("Bearer {}", token))
}

/// Extract the raw session token value from cookies (without "Bearer" prefix).
fn extract_session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|c| {
                cookie::Cookie::parse(c.trim())
                    .ok()
                    .filter(|parsed| parsed.name() == SESSION_COOKIE_NAME)
                    .map(|parsed| parsed.value().to_string())
            })
        })
}

/// Authenticate the request and require that real credentials were accepted.
pub async fn authenticate_required(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthContext, ApiError> {
    let auth_token = extract_auth_token(headers);

    let auth = match state
        .authenticator()
        .authenticate(auth_token.as_deref())
        .await
    {
        Ok(a) => a,
        Err(e) => {
            debug!(error = ?e, header_present = auth_token.is_some(), "authentication failure");
            return Err(ApiError::from(e));
        }
    };

    if !auth.is_authenticated() {
        debug!(header_present = auth_token.is_some(), "anonymous request rejected");
        return Err(ApiError::from(AuthError::MissingCredentials));
    }

    Ok(auth)
}

/// Authenticate if credentials are present. Failures degrade to an anonymous context.
pub async fn authenticate_optional(state: &AppState, headers: &HeaderMap) -> AuthContext {
    let Some(auth_token) = extract_auth_token(headers) else {
        return AuthContext::anonymous();
    };

    match state.authenticator().authenticate(Some(&auth_token)).await {
        Ok(auth) => auth,
        Err(e) => {
            debug!(error = ?e, "optional authentication failed");
            AuthContext::anonymous()
        }
    }
}

/// Credentials are demanded when `required` is set and the server does not run
/// in anonymous mode. Otherwise they are optional.
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    required: bool,
) -> Result<AuthContext, ApiError> {
    if required && !state.allows_anonymous() {
        authenticate_required(state, headers).await
    } else {
        Ok(authenticate_optional(state, headers).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use asyncrest_auth::{AllowAnonymousAuthenticator, TestAuthenticator};
    use asyncrest_task_queue::TaskQueueClient;
    use axum::http::HeaderValue;

    use crate::rate_limiter::RateLimiterManager;
    use crate::resource::ResourceRegistry;

    fn state(auth: Arc<dyn asyncrest_auth::AuthenticatorTrait>) -> AppState {
        AppState::new(
            auth,
            TaskQueueClient::new(),
            RateLimiterManager::disabled(),
            ResourceRegistry::new(),
        )
    }

    #[tokio::test]
    async fn anonymous_mode_relaxes_required_credentials() {
        let closed = state(Arc::new(AllowAnonymousAuthenticator));
        assert!(authenticate(&closed, &HeaderMap::new(), true).await.is_err());

        let open = closed.with_anonymous_access(true);
        let ctx = authenticate(&open, &HeaderMap::new(), true).await.unwrap();
        assert!(!ctx.is_authenticated());
    }

    #[tokio::test]
    async fn rejected_token_degrades_when_optional() {
        let st = state(Arc::new(TestAuthenticator::rejecting()));
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer bad"));
        assert!(authenticate(&st, &headers, true).await.is_err());
        let ctx = authenticate(&st, &headers, false).await.unwrap();
        assert!(!ctx.is_authenticated());
    }

    #[test]
    fn header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        headers.insert(
            "cookie",
            HeaderValue::from_static("asyncrest_session=xyz"),
        );
        assert_eq!(extract_auth_token(&headers).as_deref(), Some("Bearer abc"));
    }

    #[test]
    fn cookie_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("theme=dark; asyncrest_session=xyz"),
        );
        assert_eq!(extract_auth_token(&headers).as_deref(), Some("Bearer xyz"));
        assert_eq!(extract_auth_token(&HeaderMap::new()), None);
    }
}
