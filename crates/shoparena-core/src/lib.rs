//! Shoparena Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout Shoparena:
//! - Account model shared by buyers and sellers
//! - Catalog models (categories, products, carts)
//! - Common error taxonomy
//! - Store traits and their PostgreSQL implementation
//! - Product search resolution
//! - Profile and credential mutation
//! - Configuration management
//!
//! Author: Shoparena developers

pub mod config;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod postgres;
pub mod profile;
pub mod search;
pub mod store;

pub use config::{AppConfig, AuthConfig, ConfigError, DatabaseConfig, MailConfig, StorageConfig};
pub use profile::ProfileMutator;
pub use search::{SearchParams, SearchResolver};
pub use store::{AccountDirectory, AccountStore, BlacklistStore, CatalogStore, ProductFilter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Error taxonomy shared by every Shoparena operation
#[derive(Error, Debug)]
pub enum ArenaError {
    /// Missing, invalid or revoked credentials, or an inactive account
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Unique-field violation reported by the store
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Any persistence failure; deliberately opaque
    #[error("Store failure: {0}")]
    StoreFailure(String),
}

impl ArenaError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable error kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::StoreFailure(_) => "STORE_FAILURE",
        }
    }
}

pub type Result<T> = std::result::Result<T, ArenaError>;

// ============================================================================
// Accounts
// ============================================================================

/// Account kind
///
/// Buyers and sellers live in separate relations. A username, email or phone
/// is unique within its own relation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Seller,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Buyer, Role::Seller];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
        }
    }

    /// Relation holding accounts of this kind
    pub fn table(&self) -> &'static str {
        match self {
            Role::Buyer => "buyers",
            Role::Seller => "sellers",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "buyer" => Ok(Role::Buyer),
            "seller" => Ok(Role::Seller),
            other => Err(ArenaError::validation(
                "role",
                format!("unknown role '{other}'"),
            )),
        }
    }
}

/// Persisted account record, identical in shape for buyers and sellers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Argon2id PHC string; never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: String,
    pub image_url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create an account at signup
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: String,
}

/// Partial profile update
///
/// `None` leaves the stored value untouched. `Some("")` clears the field
/// where clearing is allowed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.email.is_none()
    }

    /// Apply the provided fields to an in-memory record
    pub fn apply_to(&self, account: &mut Account) {
        if let Some(v) = &self.first_name {
            account.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            account.last_name = v.clone();
        }
        if let Some(v) = &self.phone {
            account.phone = v.clone();
        }
        if let Some(v) = &self.address {
            account.address = v.clone();
        }
        if let Some(v) = &self.email {
            account.email = v.clone();
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Price in whole currency units, never negative
    pub price: i64,
    pub quantity: i32,
    pub seller_id: i64,
    pub category_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Shopping cart, owned by exactly one buyer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cart {
    pub id: i64,
    pub buyer_id: i64,
    pub created_at: DateTime<Utc>,
}
