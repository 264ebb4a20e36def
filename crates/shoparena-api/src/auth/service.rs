//! Authentication service layer
//!
//! Signup, login, logout and the password flows for both account kinds.
//! Every operation takes the role explicitly and reaches the right relation
//! through the [`AccountDirectory`]; nothing here is duplicated per role.

use super::jwt::{JwtError, TokenAuthority};
use super::middleware::AuthenticatedAccount;
use super::models::{
    AccountView, AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest,
    ResetPasswordRequest, SignupRequest,
};
use super::password::{
    hash_password_with_config, validate_password_strength, verify_password, PasswordConfig,
};
use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::error::AppError;
use crate::mailer::Mailer;
use shoparena_core::{AccountDirectory, NewAccount, ProfileMutator, Role};
use std::sync::Arc;
use tracing::{debug, warn};
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    accounts: AccountDirectory,
    tokens: TokenAuthority,
    profiles: ProfileMutator,
    mailer: Arc<dyn Mailer>,
    password_config: PasswordConfig,
    reset_link_base: String,
}

impl AuthService {
    pub fn new(
        accounts: AccountDirectory,
        tokens: TokenAuthority,
        mailer: Arc<dyn Mailer>,
        reset_link_base: impl Into<String>,
    ) -> Self {
        Self {
            profiles: ProfileMutator::new(accounts.clone()),
            accounts,
            tokens,
            mailer,
            password_config: PasswordConfig::default(),
            reset_link_base: reset_link_base.into(),
        }
    }

    /// Override the Argon2 cost parameters used for new hashes
    pub fn with_password_config(mut self, config: PasswordConfig) -> Self {
        self.password_config = config;
        self
    }

    /// Register a new account
    ///
    /// A buyer and its cart are stored together or not at all.
    pub async fn signup(
        &self,
        role: Role,
        request: SignupRequest,
        ctx: &AuditContext,
    ) -> Result<AccountView, AppError> {
        let fail = |reason: String| {
            audit_log(&AuditEvent::SignupFailure {
                role,
                email: request.email.clone(),
                reason,
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
            });
        };

        if let Err(errors) = request.validate() {
            let err = AppError::from(errors);
            fail(format!("{err:?}"));
            return Err(err);
        }
        if let Err(message) = validate_password_strength(&request.password) {
            fail(message.clone());
            return Err(AppError::Validation {
                field: "password".to_string(),
                message,
            });
        }

        let password_hash = self.hash(&request.password)?;
        let new_account = NewAccount {
            username: request.username.clone(),
            email: request.email.clone(),
            password_hash,
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            phone: request.phone.clone(),
            address: request.address.clone(),
        };

        let store = self.accounts.for_role(role);
        let created = match role {
            Role::Buyer => store.create_with_cart(&new_account).await.map(|(account, cart)| {
                debug!(buyer_id = account.id, cart_id = cart.id, "Cart created");
                account
            }),
            Role::Seller => store.create(&new_account).await,
        };
        let account = match created {
            Ok(account) => account,
            Err(e) => {
                fail(e.to_string());
                return Err(e.into());
            }
        };

        audit_log(&AuditEvent::SignupSuccess {
            account_id: account.id,
            role,
            email: account.email.clone(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        });

        Ok(AccountView::new(account, role))
    }

    /// Exchange email and password for a session token
    ///
    /// Unknown email, inactive account and wrong password are reported the
    /// same way to the caller.
    pub async fn login(
        &self,
        role: Role,
        request: LoginRequest,
        ctx: &AuditContext,
    ) -> Result<AuthResponse, AppError> {
        let fail = |reason: &str| {
            audit_log(&AuditEvent::LoginFailure {
                role,
                email: request.email.clone(),
                reason: reason.to_string(),
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
            });
            AppError::Unauthorized(INVALID_CREDENTIALS.to_string())
        };

        request.validate()?;

        let account = match self.accounts.for_role(role).find_by_email(&request.email).await? {
            Some(account) => account,
            None => return Err(fail("unknown email")),
        };
        if !account.is_active {
            return Err(fail("account inactive"));
        }

        let valid = verify_password(&request.password, &account.password_hash)
            .map_err(|e| AppError::Internal(format!("Failed to verify password: {e}")))?;
        if !valid {
            return Err(fail("wrong password"));
        }

        let access_token = self.tokens.issue(account.id, role).map_err(token_error)?;

        audit_log(&AuditEvent::LoginSuccess {
            account_id: account.id,
            role,
            email: account.email.clone(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        });

        Ok(AuthResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.config().access_expiration_secs,
            account: AccountView::new(account, role),
        })
    }

    /// Blacklist the token the request was authenticated with
    pub async fn logout(
        &self,
        auth: &AuthenticatedAccount,
        ctx: &AuditContext,
    ) -> Result<(), AppError> {
        self.tokens.revoke(&auth.token).await?;

        audit_log(&AuditEvent::Logout {
            account_id: auth.account.id,
            role: auth.role,
            email: auth.account.email.clone(),
            ip_address: ctx.ip_address.clone(),
        });
        Ok(())
    }

    /// Change the password of the authenticated account
    ///
    /// The current password is checked against the hash the guard resolved;
    /// the store then swaps that exact hash, so of two concurrent changes
    /// only the first wins.
    pub async fn change_password(
        &self,
        auth: &AuthenticatedAccount,
        request: ChangePasswordRequest,
        ctx: &AuditContext,
    ) -> Result<(), AppError> {
        request.validate()?;

        let matches = verify_password(&request.current_password, &auth.account.password_hash)
            .map_err(|e| AppError::Internal(format!("Failed to verify password: {e}")))?;
        if !matches {
            return Err(AppError::Validation {
                field: "current_password".to_string(),
                message: "does not match".to_string(),
            });
        }
        validate_password_strength(&request.new_password).map_err(|message| {
            AppError::Validation {
                field: "new_password".to_string(),
                message,
            }
        })?;

        let new_hash = self.hash(&request.new_password)?;
        let account = self
            .profiles
            .change_password(auth.role, &auth.account.password_hash, &new_hash)
            .await?;

        audit_log(&AuditEvent::PasswordChange {
            account_id: account.id,
            role: auth.role,
            email: account.email,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        });
        Ok(())
    }

    /// Mail a reset link to an active account
    ///
    /// Succeeds whether or not the email is registered, and whether or not
    /// the mail went out.
    pub async fn forgot_password(
        &self,
        role: Role,
        request: ForgotPasswordRequest,
        ctx: &AuditContext,
    ) -> Result<(), AppError> {
        request.validate()?;

        let account = self
            .accounts
            .for_role(role)
            .find_by_email(&request.email)
            .await?
            .filter(|a| a.is_active);

        if let Some(account) = &account {
            let token = self.tokens.issue_reset(account.id, role).map_err(token_error)?;
            let link = format!("{}?token={token}&role={role}", self.reset_link_base);
            let body = format!(
                "<p>Hello {},</p><p>Use the link below to choose a new password. \
                 It expires in {} minutes.</p><p><a href=\"{link}\">{link}</a></p>",
                account.first_name,
                self.tokens.config().reset_expiration_secs / 60,
            );

            if !self
                .mailer
                .send_mail("Reset your Shoparena password", &body, &account.email)
                .await
            {
                warn!(%role, account_id = account.id, "Password reset mail was not sent");
            }
        }

        audit_log(&AuditEvent::PasswordResetRequested {
            role,
            email: request.email.clone(),
            account_found: account.is_some(),
            ip_address: ctx.ip_address.clone(),
        });
        Ok(())
    }

    /// Set a new password using a reset token
    ///
    /// The token is spent before the password is written; of several
    /// requests carrying the same token only the one that spends it proceeds.
    pub async fn reset_password(
        &self,
        role: Role,
        request: ResetPasswordRequest,
        ctx: &AuditContext,
    ) -> Result<(), AppError> {
        let rejected = |reason: String| {
            audit_log(&AuditEvent::InvalidToken {
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
                reason,
            });
            AppError::Unauthorized(INVALID_RESET_TOKEN.to_string())
        };

        request.validate()?;

        let claims = self
            .tokens
            .validate_reset(&request.token, role)
            .await
            .map_err(|e| match e {
                JwtError::Store(e) => AppError::from(e),
                other => rejected(other.to_string()),
            })?;
        let account_id = claims.account_id().map_err(|e| rejected(e.to_string()))?;

        validate_password_strength(&request.new_password).map_err(|message| {
            AppError::Validation {
                field: "new_password".to_string(),
                message,
            }
        })?;
        let new_hash = self.hash(&request.new_password)?;

        let account = self
            .accounts
            .for_role(role)
            .find_by_id(account_id)
            .await?
            .filter(|a| a.is_active)
            .ok_or_else(|| rejected(format!("{role} {account_id} is missing or inactive")))?;

        if !self.tokens.revoke(&request.token).await? {
            return Err(rejected("reset token already used".to_string()));
        }

        let account = self
            .profiles
            .reset_password(role, &account.email, &new_hash)
            .await?;

        audit_log(&AuditEvent::PasswordReset {
            account_id: account.id,
            role,
            email: account.email,
            ip_address: ctx.ip_address.clone(),
        });
        Ok(())
    }

    fn hash(&self, password: &str) -> Result<String, AppError> {
        hash_password_with_config(password, &self.password_config)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
    }
}

fn token_error(err: JwtError) -> AppError {
    match err {
        JwtError::Store(e) => AppError::from(e),
        other => AppError::Internal(format!("Failed to issue token: {other}")),
    }
}
