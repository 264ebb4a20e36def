//! Request and response models for account endpoints
//!
//! Persisted records live in `shoparena_core`; these are the wire shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shoparena_core::{Account, ProfileUpdate, Role};
use utoipa::ToSchema;
use validator::Validate;

/// Signup request, identical for buyers and sellers
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 3, max = 32, message = "must be 3 to 32 characters"))]
    pub username: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, message = "is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "is required"))]
    pub last_name: String,
    #[validate(length(min = 7, max = 20, message = "must be 7 to 20 characters"))]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub password: String,
}

/// Partial profile update
///
/// Omitted fields are left as they are; an empty string clears a name or
/// the address.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(req: UpdateProfileRequest) -> Self {
        Self {
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            address: req.address,
            email: req.email,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub token: String,
    pub new_password: String,
}

/// Public view of an account; never carries the password hash
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountView {
    pub id: i64,
    #[schema(value_type = String, example = "buyer")]
    pub role: Role,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

impl AccountView {
    pub fn new(account: Account, role: Role) -> Self {
        Self {
            id: account.id,
            role,
            username: account.username,
            email: account.email,
            first_name: account.first_name,
            last_name: account.last_name,
            phone: account.phone,
            address: account.address,
            image_url: account.image_url,
            created_at: account.created_at,
        }
    }
}

/// Successful login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub account: AccountView,
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup() -> SignupRequest {
        SignupRequest {
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "Secure#Pass1".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: "08012345678".to_string(),
            address: String::new(),
        }
    }

    #[test]
    fn test_signup_validation() {
        assert!(signup().validate().is_ok());

        let bad_email = SignupRequest {
            email: "not-an-email".to_string(),
            ..signup()
        };
        let errors = bad_email.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));

        let short_name = SignupRequest {
            username: "a".to_string(),
            ..signup()
        };
        assert!(short_name.validate().is_err());
    }

    #[test]
    fn test_update_request_keeps_absent_fields_absent() {
        let req: UpdateProfileRequest =
            serde_json::from_str(r#"{"last_name": "King", "address": ""}"#).unwrap();
        let update = ProfileUpdate::from(req);

        assert_eq!(update.first_name, None);
        assert_eq!(update.last_name.as_deref(), Some("King"));
        assert_eq!(update.address.as_deref(), Some(""));
    }
}
