/// Role guards for protected routes
///
/// One implementation, instantiated once per role. A guard extracts the
/// bearer token, validates it through the token authority (blacklist
/// included), requires the token's role to match its own, then resolves the
/// account by id in that role's relation. Missing and inactive accounts are
/// rejected. On success the resolved account is added to request extensions.
use super::jwt::JwtError;
use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use shoparena_core::{Account, ArenaError, Role};
use std::sync::Arc;
use thiserror::Error;

/// Account resolved by a guard
///
/// Extract in handlers with `Extension<AuthenticatedAccount>`.
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount {
    pub account: Account,
    pub role: Role,
    /// Bearer token value as presented, for logout
    pub token: String,
}

/// Guard rejection reasons
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(JwtError),

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Token was issued for another role")]
    RoleMismatch,

    #[error("Account not found or inactive")]
    AccountUnavailable,

    #[error("Store failure: {0}")]
    Store(#[from] ArenaError),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Revoked => AuthError::TokenRevoked,
            JwtError::Store(e) => AuthError::Store(e),
            other => AuthError::InvalidToken(other),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AuthError::MissingAuthHeader => (
                StatusCode::UNAUTHORIZED,
                ApiError::unauthorized("Missing Authorization header"),
            ),
            AuthError::InvalidAuthHeader => (
                StatusCode::UNAUTHORIZED,
                ApiError::unauthorized("Invalid Authorization header format"),
            ),
            AuthError::InvalidToken(_) => (
                StatusCode::UNAUTHORIZED,
                ApiError::unauthorized("Invalid or expired token"),
            ),
            AuthError::TokenRevoked => (
                StatusCode::UNAUTHORIZED,
                ApiError::unauthorized("Token has been revoked"),
            ),
            AuthError::RoleMismatch | AuthError::AccountUnavailable => (
                StatusCode::UNAUTHORIZED,
                ApiError::unauthorized("Authentication required"),
            ),
            AuthError::Store(e) => {
                tracing::error!(error = %e, "Guard lookup failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new("DATABASE_ERROR", "Database operation failed"),
                )
            }
        };

        (status, Json(error)).into_response()
    }
}

/// Guard state: the application plus the role this guard admits
#[derive(Clone)]
pub struct RoleGuard {
    state: Arc<AppState>,
    role: Role,
}

impl RoleGuard {
    pub fn new(state: Arc<AppState>, role: Role) -> Self {
        Self { state, role }
    }

    pub fn buyer(state: Arc<AppState>) -> Self {
        Self::new(state, Role::Buyer)
    }

    pub fn seller(state: Arc<AppState>) -> Self {
        Self::new(state, Role::Seller)
    }

    /// Resolve the account a request's bearer token stands for
    pub async fn authorize(
        &self,
        headers: &HeaderMap,
        resource: &str,
    ) -> Result<AuthenticatedAccount, AuthError> {
        let ctx = AuditContext::from_headers(headers);
        let reject = |reason: String| {
            audit_log(&AuditEvent::InvalidToken {
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
                reason,
            });
        };

        let token = bearer_token(headers)?;

        let claims = match self.state.tokens.validate(token).await {
            Ok(c) => c,
            Err(JwtError::Store(e)) => return Err(AuthError::Store(e)),
            Err(e) => {
                reject(e.to_string());
                return Err(e.into());
            }
        };

        if claims.role != self.role {
            audit_log(&AuditEvent::AccessDenied {
                account_id: claims.sub.clone(),
                token_role: claims.role,
                required_role: self.role,
                resource: resource.to_string(),
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
            });
            return Err(AuthError::RoleMismatch);
        }

        let account_id = claims.account_id().map_err(|e| {
            reject(e.to_string());
            AuthError::from(e)
        })?;
        let account = self
            .state
            .accounts
            .for_role(self.role)
            .find_by_id(account_id)
            .await?;

        match account {
            Some(account) if account.is_active => Ok(AuthenticatedAccount {
                account,
                role: self.role,
                token: token.to_string(),
            }),
            Some(_) => {
                reject(format!("{} account is inactive", self.role));
                Err(AuthError::AccountUnavailable)
            }
            None => {
                reject(format!("{} account does not exist", self.role));
                Err(AuthError::AccountUnavailable)
            }
        }
    }
}

/// Middleware entry point; layer with `from_fn_with_state(RoleGuard::buyer(..), require_role)`
pub async fn require_role(
    State(guard): State<RoleGuard>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let resource = request.uri().path().to_string();
    let authenticated = guard.authorize(request.headers(), &resource).await?;

    request.extensions_mut().insert(authenticated);

    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestApp;
    use axum::http::HeaderValue;
    use shoparena_core::ProfileUpdate;

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers_with("abc")).unwrap(), "abc");
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingAuthHeader)
        ));

        let mut basic = HeaderMap::new();
        basic.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert!(matches!(bearer_token(&basic), Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn test_guard_resolves_active_account() {
        let app = TestApp::new();
        let seller = app.seed_account(Role::Seller, "shop", "shop@example.com").await;
        let token = app.state.tokens.issue(seller.id, Role::Seller).unwrap();

        let auth = RoleGuard::seller(app.state.clone())
            .authorize(&headers_with(&token), "/test")
            .await
            .unwrap();
        assert_eq!(auth.account.username, "shop");
        assert_eq!(auth.role, Role::Seller);
        assert_eq!(auth.token, token);
    }

    #[tokio::test]
    async fn test_guard_rejects_other_role() {
        let app = TestApp::new();
        let seller = app.seed_account(Role::Seller, "shop", "shop@example.com").await;
        app.seed_account(Role::Buyer, "shop", "shop@example.com").await;
        let token = app.state.tokens.issue(seller.id, Role::Seller).unwrap();

        let result = RoleGuard::buyer(app.state.clone())
            .authorize(&headers_with(&token), "/test")
            .await;
        assert!(matches!(result, Err(AuthError::RoleMismatch)));
    }

    #[tokio::test]
    async fn test_guard_rejects_inactive_and_missing_accounts() {
        let app = TestApp::new();
        let ada = app.seed_account(Role::Buyer, "ada", "ada@example.com").await;
        app.backend.buyers.set_active("ada@example.com", false).await;

        let inactive = app.state.tokens.issue(ada.id, Role::Buyer).unwrap();
        let missing = app.state.tokens.issue(ada.id + 100, Role::Buyer).unwrap();
        let guard = RoleGuard::buyer(app.state.clone());

        for token in [inactive, missing] {
            let result = guard.authorize(&headers_with(&token), "/test").await;
            assert!(matches!(result, Err(AuthError::AccountUnavailable)));
        }
    }

    #[tokio::test]
    async fn test_guard_rejects_blacklisted_token() {
        let app = TestApp::new();
        let ada = app.seed_account(Role::Buyer, "ada", "ada@example.com").await;
        let token = app.state.tokens.issue(ada.id, Role::Buyer).unwrap();
        app.state.tokens.revoke(&token).await.unwrap();

        let result = RoleGuard::buyer(app.state.clone())
            .authorize(&headers_with(&token), "/test")
            .await;
        assert!(matches!(result, Err(AuthError::TokenRevoked)));
    }

    #[tokio::test]
    async fn test_token_follows_account_across_email_change() {
        let app = TestApp::new();
        let ada = app.seed_account(Role::Buyer, "ada", "ada@example.com").await;
        let token = app.state.tokens.issue(ada.id, Role::Buyer).unwrap();

        let update = ProfileUpdate {
            email: Some("ada.l@example.com".to_string()),
            ..Default::default()
        };
        app.state
            .profiles
            .update_profile(ada.id, Role::Buyer, &update)
            .await
            .unwrap();
        // The freed address now belongs to someone else
        app.seed_account(Role::Buyer, "mallory", "ada@example.com").await;

        let auth = RoleGuard::buyer(app.state.clone())
            .authorize(&headers_with(&token), "/test")
            .await
            .unwrap();
        assert_eq!(auth.account.id, ada.id);
        assert_eq!(auth.account.username, "ada");
        assert_eq!(auth.account.email, "ada.l@example.com");
    }
}
