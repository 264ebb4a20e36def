//! Store accessor traits
//!
//! Narrow interfaces over the persisted relations. Implementations hold no
//! business logic: the resolver, mutator and guards decide what a result means.

use crate::{Account, Cart, Category, NewAccount, Product, ProfileUpdate, Result, Role};
use async_trait::async_trait;
use std::sync::Arc;

/// Access to one account relation (buyers or sellers)
///
/// Lookups return records regardless of their `is_active` flag. Updates keyed
/// by a credential (`update_password_by_hash`, `update_password_by_email`) only
/// ever touch active rows.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new active account, stamping its creation time
    async fn create(&self, account: &NewAccount) -> Result<Account>;

    /// Insert a buyer together with its empty cart
    ///
    /// Both rows are written or neither is. Fails with `Validation` on the
    /// seller relation, which owns no carts.
    async fn create_with_cart(&self, account: &NewAccount) -> Result<(Account, Cart)>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Account>>;

    /// All accounts in the relation, ordered by id
    async fn list(&self) -> Result<Vec<Account>>;

    /// Apply the provided fields. Returns `false` when no row has this id.
    async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<bool>;

    /// Replace the hash of the active account whose stored hash equals `current_hash`
    async fn update_password_by_hash(
        &self,
        current_hash: &str,
        new_hash: &str,
    ) -> Result<Option<Account>>;

    /// Replace the hash of the active account registered under `email`
    async fn update_password_by_email(&self, email: &str, new_hash: &str)
        -> Result<Option<Account>>;

    /// Returns `false` when no row has this username
    async fn set_image_url(&self, username: &str, url: &str) -> Result<bool>;
}

/// Conjunctive product predicate; `None` means "do not filter on this field"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category_id: Option<i64>,
    pub seller_id: Option<i64>,
    /// Inclusive lower bound
    pub min_price: Option<i64>,
    /// Inclusive upper bound
    pub max_price: Option<i64>,
    /// Unanchored substring of the title
    pub title_contains: Option<String>,
}

impl ProductFilter {
    /// Evaluate the predicate against a single product
    pub fn matches(&self, product: &Product) -> bool {
        self.category_id.map_or(true, |c| product.category_id == c)
            && self.seller_id.map_or(true, |s| product.seller_id == s)
            && self.min_price.map_or(true, |p| product.price >= p)
            && self.max_price.map_or(true, |p| product.price <= p)
            && self
                .title_contains
                .as_deref()
                .map_or(true, |n| product.title.contains(n))
    }
}

/// Categories and products
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>>;

    async fn create_category(&self, name: &str) -> Result<Category>;

    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// Every product satisfying `filter`, ordered by id
    async fn query_products(&self, filter: &ProductFilter) -> Result<Vec<Product>>;

    async fn find_product(&self, id: i64) -> Result<Option<Product>>;

    /// Round-trip to the backing store
    async fn ping(&self) -> Result<()>;
}

/// Append-only set of revoked token values
#[async_trait]
pub trait BlacklistStore: Send + Sync {
    /// Add `token`; `true` when it was not yet present
    ///
    /// Inserting a value already present is not an error. Concurrent inserts
    /// of one value report `true` to exactly one caller.
    async fn insert(&self, token: &str) -> Result<bool>;

    async fn contains(&self, token: &str) -> Result<bool>;
}

/// Role-indexed pair of account stores
///
/// Guards and the mutator select the relation through this strategy instead
/// of carrying per-role copies of their logic.
#[derive(Clone)]
pub struct AccountDirectory {
    buyers: Arc<dyn AccountStore>,
    sellers: Arc<dyn AccountStore>,
}

impl AccountDirectory {
    pub fn new(buyers: Arc<dyn AccountStore>, sellers: Arc<dyn AccountStore>) -> Self {
        Self { buyers, sellers }
    }

    pub fn for_role(&self, role: Role) -> &Arc<dyn AccountStore> {
        match role {
            Role::Buyer => &self.buyers,
            Role::Seller => &self.sellers,
        }
    }
}
