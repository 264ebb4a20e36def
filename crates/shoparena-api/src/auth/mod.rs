//! Authentication and authorization module
//!
//! - Token authority: JWT issue, validation and blacklist revocation
//! - Password hashing with Argon2id
//! - Role guards for buyer and seller routes
//! - Authentication service for signup, login and the password flows
//! - Request and response models
//!
//! Author: Shoparena developers

pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;

pub use jwt::{Claims, JwtConfig, JwtError, TokenAuthority, TokenPurpose};
pub use middleware::{require_role, AuthError, AuthenticatedAccount, RoleGuard};
pub use models::{
    AccountView, AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest,
    MessageResponse, ResetPasswordRequest, SignupRequest, UpdateProfileRequest,
};
pub use password::{validate_password_strength, verify_password, PasswordConfig};
pub use service::AuthService;
