//! Security audit logging for authentication events
//!
//! All audit events are logged at INFO level with the "audit" target so they
//! can be filtered and routed separately from application logs. The event is
//! also attached as a JSON string for log aggregators.
//!
//! ```ignore
//! use shoparena_api::audit::{audit_log, AuditContext, AuditEvent};
//!
//! let ctx = AuditContext::from_headers(request.headers());
//! audit_log(&AuditEvent::LoginSuccess {
//!     account_id: account.id,
//!     role: Role::Buyer,
//!     email: account.email.clone(),
//!     ip_address: ctx.ip_address.clone(),
//!     user_agent: ctx.user_agent.clone(),
//! });
//! ```
//!
//! Author: Shoparena developers

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shoparena_core::Role;
use tracing::info;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    SignupSuccess {
        account_id: i64,
        role: Role,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    SignupFailure {
        role: Role,
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    LoginSuccess {
        account_id: i64,
        role: Role,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Unknown email, inactive account or wrong password
    LoginFailure {
        role: Role,
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Session token placed on the blacklist
    Logout {
        account_id: i64,
        role: Role,
        email: String,
        ip_address: Option<String>,
    },

    PasswordChange {
        account_id: i64,
        role: Role,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Reset mail requested; logged whether or not the account exists
    PasswordResetRequested {
        role: Role,
        email: String,
        account_found: bool,
        ip_address: Option<String>,
    },

    PasswordReset {
        account_id: i64,
        role: Role,
        email: String,
        ip_address: Option<String>,
    },

    /// Token for one role presented to the other role's guard
    AccessDenied {
        account_id: String,
        token_role: Role,
        required_role: Role,
        resource: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Invalid, expired or revoked token, or a token for a missing account
    InvalidToken {
        ip_address: Option<String>,
        user_agent: Option<String>,
        reason: String,
    },
}

/// Request metadata attached to audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditContext {
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            timestamp: Utc::now(),
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

impl Default for AuditContext {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            ip_address: None,
            user_agent: None,
        }
    }
}

/// Log a security audit event with structured fields
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event {
        AuditEvent::SignupSuccess {
            account_id,
            role,
            email,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                account_id = %account_id,
                role = %role,
                email = %email,
                ip_address = ?ip_address,
                "Signup successful"
            );
        }
        AuditEvent::SignupFailure {
            role,
            email,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                role = %role,
                email = %email,
                reason = %reason,
                ip_address = ?ip_address,
                "Signup failed"
            );
        }
        AuditEvent::LoginSuccess {
            account_id,
            role,
            email,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                account_id = %account_id,
                role = %role,
                email = %email,
                ip_address = ?ip_address,
                "Login successful"
            );
        }
        AuditEvent::LoginFailure {
            role,
            email,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                role = %role,
                email = %email,
                reason = %reason,
                ip_address = ?ip_address,
                "Login failed"
            );
        }
        AuditEvent::Logout {
            account_id,
            role,
            email,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                account_id = %account_id,
                role = %role,
                email = %email,
                ip_address = ?ip_address,
                "Logout"
            );
        }
        AuditEvent::PasswordChange {
            account_id,
            role,
            email,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                account_id = %account_id,
                role = %role,
                email = %email,
                ip_address = ?ip_address,
                "Password changed"
            );
        }
        AuditEvent::PasswordResetRequested {
            role,
            email,
            account_found,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                role = %role,
                email = %email,
                account_found = %account_found,
                ip_address = ?ip_address,
                "Password reset requested"
            );
        }
        AuditEvent::PasswordReset {
            account_id,
            role,
            email,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                account_id = %account_id,
                role = %role,
                email = %email,
                ip_address = ?ip_address,
                "Password reset"
            );
        }
        AuditEvent::AccessDenied {
            account_id,
            token_role,
            required_role,
            resource,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                account_id = %account_id,
                token_role = %token_role,
                required_role = %required_role,
                resource = %resource,
                ip_address = ?ip_address,
                "Access denied"
            );
        }
        AuditEvent::InvalidToken {
            ip_address, reason, ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                ip_address = ?ip_address,
                reason = %reason,
                "Invalid token"
            );
        }
    }
}

/// Client IP from `X-Forwarded-For` (first hop) or `X-Real-IP`
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                return Some(first_ip.trim().to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.to_string());
        }
    }

    None
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent::LoginSuccess {
            account_id: 7,
            role: Role::Seller,
            email: "shop@example.com".to_string(),
            ip_address: Some("192.168.1.1".to_string()),
            user_agent: None,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"login_success\""));
        assert!(json.contains("\"role\":\"seller\""));
        assert!(json.contains("shop@example.com"));
    }

    #[test]
    fn test_audit_log_does_not_panic() {
        audit_log(&AuditEvent::AccessDenied {
            account_id: "7".to_string(),
            token_role: Role::Buyer,
            required_role: Role::Seller,
            resource: "/api/v1/seller/shop".to_string(),
            ip_address: None,
            user_agent: None,
        });
        audit_log(&AuditEvent::PasswordResetRequested {
            role: Role::Buyer,
            email: "nobody@example.com".to_string(),
            account_found: false,
            ip_address: None,
        });
    }

    #[test]
    fn test_extract_ip_from_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.5, 10.0.0.1"),
        );
        assert_eq!(extract_ip_address(&headers), Some("203.0.113.5".to_string()));
    }

    #[test]
    fn test_extract_ip_from_x_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.7"));
        assert_eq!(extract_ip_address(&headers), Some("198.51.100.7".to_string()));
    }

    #[test]
    fn test_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::USER_AGENT,
            HeaderValue::from_static("curl/8.0"),
        );

        let ctx = AuditContext::from_headers(&headers);
        assert_eq!(ctx.user_agent.as_deref(), Some("curl/8.0"));
        assert!(ctx.ip_address.is_none());
    }
}
