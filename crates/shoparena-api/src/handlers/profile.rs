//! Profile handlers for the authenticated account
//!
//! Author: Shoparena developers

use crate::audit::AuditContext;
use crate::auth::{
    AccountView, AuthenticatedAccount, ChangePasswordRequest, MessageResponse,
    UpdateProfileRequest,
};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    http::HeaderMap,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use shoparena_core::ProfileUpdate;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Multipart body of an image upload
#[derive(Debug, Deserialize, ToSchema)]
pub struct ImageUpload {
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImageResponse {
    pub image_url: String,
}

/// Current profile
#[utoipa::path(
    get,
    path = "/api/v1/{role}/profile",
    tag = "profile",
    params(("role" = String, Path, description = "`buyer` or `seller`")),
    responses(
        (status = 200, description = "Profile", body = AccountView),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_profile(Extension(auth): Extension<AuthenticatedAccount>) -> impl IntoResponse {
    Json(AccountView::new(auth.account, auth.role))
}

/// Update profile fields
///
/// Only the fields present in the body change. Names and address can be
/// cleared with an empty string; email and phone cannot.
#[utoipa::path(
    put,
    path = "/api/v1/{role}/profile",
    tag = "profile",
    params(("role" = String, Path, description = "`buyer` or `seller`")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = AccountView),
        (status = 400, description = "Invalid field", body = crate::error::ApiError),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 409, description = "Email or phone already taken", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedAccount>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let update = ProfileUpdate::from(request);
    state
        .profiles
        .update_profile(auth.account.id, auth.role, &update)
        .await?;

    let account = state
        .accounts
        .for_role(auth.role)
        .find_by_id(auth.account.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {} not found", auth.role, auth.account.id)))?;

    Ok(Json(AccountView::new(account, auth.role)))
}

/// Change password
#[utoipa::path(
    put,
    path = "/api/v1/{role}/updatepassword",
    tag = "profile",
    params(("role" = String, Path, description = "`buyer` or `seller`")),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Wrong current password or weak new password", body = crate::error::ApiError),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedAccount>,
    headers: HeaderMap,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = AuditContext::from_headers(&headers);
    state.auth.change_password(&auth, request, &ctx).await?;

    Ok(Json(MessageResponse::new("Password updated successfully")))
}

/// Upload a profile image
///
/// Expects a multipart form with an `image` file field.
#[utoipa::path(
    put,
    path = "/api/v1/{role}/profile/image",
    tag = "profile",
    params(("role" = String, Path, description = "`buyer` or `seller`")),
    request_body(content = ImageUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image stored", body = ImageResponse),
        (status = 400, description = "Missing, oversized or unsupported file", body = crate::error::ApiError),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_profile_image(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedAccount>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let max_size = state.config.server.max_upload_size;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let extension = field
            .file_name()
            .and_then(image_extension)
            .ok_or_else(|| AppError::Validation {
                field: "image".to_string(),
                message: format!("must be one of {}", IMAGE_EXTENSIONS.join(", ")),
            })?;
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| format!("image/{extension}"));

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {e}")))?;
        if bytes.is_empty() {
            return Err(AppError::Validation {
                field: "image".to_string(),
                message: "is empty".to_string(),
            });
        }
        if bytes.len() > max_size {
            return Err(AppError::Validation {
                field: "image".to_string(),
                message: format!("exceeds {max_size} bytes"),
            });
        }

        let filename = format!(
            "{}/{}-{}.{extension}",
            auth.role,
            auth.account.username,
            Uuid::new_v4()
        );
        let image_url = state
            .object_store
            .upload(bytes.to_vec(), &filename, &content_type)
            .await
            .map_err(|e| AppError::Internal(format!("Image upload failed: {e}")))?;

        state
            .profiles
            .set_profile_image(&auth.account.username, &image_url)
            .await?;
        tracing::info!(
            role = %auth.role,
            account_id = auth.account.id,
            %image_url,
            "Profile image updated"
        );

        return Ok(Json(ImageResponse { image_url }));
    }

    Err(AppError::Validation {
        field: "image".to_string(),
        message: "is required".to_string(),
    })
}

/// Lowercased extension of `file_name` if it is an accepted image type
fn image_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("me.PNG").as_deref(), Some("png"));
        assert_eq!(image_extension("photo.final.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(image_extension("notes.txt"), None);
        assert_eq!(image_extension("no-extension"), None);
    }
}
