//! Authentication API handlers
//!
//! Mounted once under `/api/v1/buyer` and once under `/api/v1/seller`; the
//! role comes from the router the request arrived through.
//!
//! Author: Shoparena developers

use crate::audit::AuditContext;
use crate::auth::{
    AuthenticatedAccount, ForgotPasswordRequest, LoginRequest, MessageResponse,
    ResetPasswordRequest, SignupRequest,
};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use shoparena_core::Role;
use std::sync::Arc;

/// Register a new buyer or seller
///
/// Username, email and phone must be unique among accounts of the same
/// kind. Buyer accounts get an empty cart.
#[utoipa::path(
    post,
    path = "/api/v1/{role}/signup",
    tag = "auth",
    params(("role" = String, Path, description = "`buyer` or `seller`")),
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = crate::auth::AccountView),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Username, email or phone already taken", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Extension(role): Extension<Role>,
    headers: HeaderMap,
    Json(request): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = AuditContext::from_headers(&headers);
    let account = state.auth.signup(role, request, &ctx).await?;

    Ok((StatusCode::CREATED, Json(account)))
}

/// Login with email and password
///
/// Returns a session token bound to the account's email and kind.
#[utoipa::path(
    post,
    path = "/api/v1/{role}/login",
    tag = "auth",
    params(("role" = String, Path, description = "`buyer` or `seller`")),
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = crate::auth::AuthResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Extension(role): Extension<Role>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = AuditContext::from_headers(&headers);
    let response = state.auth.login(role, request, &ctx).await?;

    Ok(Json(response))
}

/// Logout
///
/// Blacklists the presented token; it is rejected by every guard from now on.
#[utoipa::path(
    post,
    path = "/api/v1/{role}/logout",
    tag = "auth",
    params(("role" = String, Path, description = "`buyer` or `seller`")),
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedAccount>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let ctx = AuditContext::from_headers(&headers);
    state.auth.logout(&auth, &ctx).await?;

    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// Request a password reset link
///
/// Always answers 200 so the response does not reveal whether the email is
/// registered.
#[utoipa::path(
    post,
    path = "/api/v1/{role}/forgotpassword",
    tag = "auth",
    params(("role" = String, Path, description = "`buyer` or `seller`")),
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Request accepted", body = MessageResponse),
        (status = 400, description = "Invalid email", body = crate::error::ApiError),
    )
)]
pub async fn forgot_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(role): Extension<Role>,
    headers: HeaderMap,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = AuditContext::from_headers(&headers);
    state.auth.forgot_password(role, request, &ctx).await?;

    Ok(Json(MessageResponse::new(
        "If the email is registered, a reset link has been sent",
    )))
}

/// Set a new password with a reset token
#[utoipa::path(
    put,
    path = "/api/v1/{role}/forgotpassword/reset",
    tag = "auth",
    params(("role" = String, Path, description = "`buyer` or `seller`")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Weak password", body = crate::error::ApiError),
        (status = 401, description = "Invalid, expired or used reset token, or inactive account", body = crate::error::ApiError),
    )
)]
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(role): Extension<Role>,
    headers: HeaderMap,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = AuditContext::from_headers(&headers);
    state.auth.reset_password(role, request, &ctx).await?;

    Ok(Json(MessageResponse::new("Password has been reset")))
}
