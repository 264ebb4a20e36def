//! In-memory store
//!
//! Process-local implementations of the store traits for tests and local
//! experiments. Uniqueness rules mirror the PostgreSQL schema.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::store::{AccountDirectory, AccountStore, BlacklistStore, CatalogStore, ProductFilter};
use crate::{Account, ArenaError, Cart, Category, NewAccount, Product, ProfileUpdate, Result, Role};

/// One account relation held in memory
pub struct MemoryAccountStore {
    role: Role,
    accounts: RwLock<Vec<Account>>,
    next_id: AtomicI64,
    /// Where buyer carts are opened; `None` for relations without carts
    carts: Option<Arc<MemoryStore>>,
}

impl MemoryAccountStore {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            accounts: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
            carts: None,
        }
    }

    /// A relation whose accounts get their carts in `store`
    pub fn with_carts(role: Role, store: Arc<MemoryStore>) -> Self {
        Self {
            carts: Some(store),
            ..Self::new(role)
        }
    }

    /// Flip the active flag, as an operator would
    pub async fn set_active(&self, email: &str, active: bool) -> bool {
        let mut accounts = self.accounts.write().await;
        match accounts.iter_mut().find(|a| a.email == email) {
            Some(account) => {
                account.is_active = active;
                true
            }
            None => false,
        }
    }

    /// Snapshot of every stored record
    pub async fn snapshot(&self) -> Vec<Account> {
        self.accounts.read().await.clone()
    }

    fn conflict(&self, field: &str) -> ArenaError {
        ArenaError::Conflict(format!("{}s_{field}_key already in use", self.role))
    }

    fn check_unique(
        &self,
        accounts: &[Account],
        skip_id: Option<i64>,
        username: Option<&str>,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<()> {
        for other in accounts.iter().filter(|a| Some(a.id) != skip_id) {
            if username == Some(other.username.as_str()) {
                return Err(self.conflict("username"));
            }
            if email == Some(other.email.as_str()) {
                return Err(self.conflict("email"));
            }
            if phone == Some(other.phone.as_str()) {
                return Err(self.conflict("phone"));
            }
        }
        Ok(())
    }

    async fn find_where(&self, pred: impl Fn(&Account) -> bool) -> Option<Account> {
        self.accounts.read().await.iter().find(|a| pred(a)).cloned()
    }

    fn record(&self, new: &NewAccount) -> Account {
        Account {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            username: new.username.clone(),
            email: new.email.clone(),
            password_hash: new.password_hash.clone(),
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            phone: new.phone.clone(),
            address: new.address.clone(),
            image_url: String::new(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create(&self, new: &NewAccount) -> Result<Account> {
        let mut accounts = self.accounts.write().await;
        self.check_unique(
            &accounts,
            None,
            Some(&new.username),
            Some(&new.email),
            Some(&new.phone),
        )?;

        let account = self.record(new);
        accounts.push(account.clone());
        Ok(account)
    }

    async fn create_with_cart(&self, new: &NewAccount) -> Result<(Account, Cart)> {
        let carts = self.carts.as_ref().ok_or_else(|| {
            ArenaError::validation("role", format!("{}s do not own a cart", self.role))
        })?;

        // The write lock is held until both records exist
        let mut accounts = self.accounts.write().await;
        self.check_unique(
            &accounts,
            None,
            Some(&new.username),
            Some(&new.email),
            Some(&new.phone),
        )?;

        let account = self.record(new);
        let cart = carts.open_cart(account.id).await?;
        accounts.push(account.clone());
        Ok((account, cart))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>> {
        Ok(self.find_where(|a| a.id == id).await)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        Ok(self.find_where(|a| a.email == email).await)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        Ok(self.find_where(|a| a.username == username).await)
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Account>> {
        Ok(self.find_where(|a| a.phone == phone).await)
    }

    async fn list(&self) -> Result<Vec<Account>> {
        Ok(self.snapshot().await)
    }

    async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<bool> {
        let mut accounts = self.accounts.write().await;
        if !accounts.iter().any(|a| a.id == id) {
            return Ok(false);
        }

        self.check_unique(
            &accounts,
            Some(id),
            None,
            update.email.as_deref(),
            update.phone.as_deref(),
        )?;

        if let Some(account) = accounts.iter_mut().find(|a| a.id == id) {
            update.apply_to(account);
        }
        Ok(true)
    }

    async fn update_password_by_hash(
        &self,
        current_hash: &str,
        new_hash: &str,
    ) -> Result<Option<Account>> {
        let mut accounts = self.accounts.write().await;
        Ok(accounts
            .iter_mut()
            .find(|a| a.is_active && a.password_hash == current_hash)
            .map(|a| {
                a.password_hash = new_hash.to_string();
                a.clone()
            }))
    }

    async fn update_password_by_email(
        &self,
        email: &str,
        new_hash: &str,
    ) -> Result<Option<Account>> {
        let mut accounts = self.accounts.write().await;
        Ok(accounts
            .iter_mut()
            .find(|a| a.is_active && a.email == email)
            .map(|a| {
                a.password_hash = new_hash.to_string();
                a.clone()
            }))
    }

    async fn set_image_url(&self, username: &str, url: &str) -> Result<bool> {
        let mut accounts = self.accounts.write().await;
        match accounts.iter_mut().find(|a| a.username == username) {
            Some(account) => {
                account.image_url = url.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Catalog and blacklist held in memory
///
/// Counts product queries so tests can assert that a search never reached
/// the product relation.
#[derive(Default)]
pub struct MemoryStore {
    categories: RwLock<Vec<Category>>,
    products: RwLock<Vec<Product>>,
    carts: RwLock<Vec<Cart>>,
    blacklist: RwLock<HashSet<String>>,
    next_id: AtomicI64,
    product_queries: AtomicUsize,
    failing: AtomicBool,
    failing_carts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Insert a category with a fixed id
    pub async fn insert_category(&self, id: i64, name: &str) -> Category {
        let category = Category {
            id,
            name: name.to_string(),
        };
        self.categories.write().await.push(category.clone());
        category
    }

    /// Insert a product with a fixed id
    pub async fn insert_product(
        &self,
        id: i64,
        title: &str,
        price: i64,
        category_id: i64,
        seller_id: i64,
    ) -> Product {
        let product = Product {
            id,
            title: title.to_string(),
            description: String::new(),
            price,
            quantity: 1,
            seller_id,
            category_id,
            created_at: Utc::now(),
        };
        let mut products = self.products.write().await;
        products.push(product.clone());
        products.sort_by_key(|p| p.id);
        product
    }

    /// Number of `query_products` calls so far
    pub fn product_query_count(&self) -> usize {
        self.product_queries.load(Ordering::SeqCst)
    }

    /// Make every subsequent product query fail
    pub fn fail_product_queries(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every subsequent cart creation fail
    pub fn fail_cart_creation(&self, failing: bool) {
        self.failing_carts.store(failing, Ordering::SeqCst);
    }

    pub async fn carts(&self) -> Vec<Cart> {
        self.carts.read().await.clone()
    }

    async fn open_cart(&self, buyer_id: i64) -> Result<Cart> {
        if self.failing_carts.load(Ordering::SeqCst) {
            return Err(ArenaError::StoreFailure(
                "Failed to create cart: connection reset".to_string(),
            ));
        }

        let cart = Cart {
            id: self.next_id(),
            buyer_id,
            created_at: Utc::now(),
        };
        self.carts.write().await.push(cart.clone());
        Ok(cart)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        Ok(self
            .categories
            .read()
            .await
            .iter()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn create_category(&self, name: &str) -> Result<Category> {
        let mut categories = self.categories.write().await;
        if categories.iter().any(|c| c.name == name) {
            return Err(ArenaError::Conflict(format!(
                "categories_name_key already in use: {name}"
            )));
        }
        let category = Category {
            id: self.next_id(),
            name: name.to_string(),
        };
        categories.push(category.clone());
        Ok(category)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories = self.categories.read().await.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn query_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        self.product_queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ArenaError::StoreFailure(
                "Failed to query products: connection reset".to_string(),
            ));
        }

        Ok(self
            .products
            .read()
            .await
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn find_product(&self, id: i64) -> Result<Option<Product>> {
        Ok(self
            .products
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl BlacklistStore for MemoryStore {
    async fn insert(&self, token: &str) -> Result<bool> {
        Ok(self.blacklist.write().await.insert(token.to_string()))
    }

    async fn contains(&self, token: &str) -> Result<bool> {
        Ok(self.blacklist.read().await.contains(token))
    }
}

/// Complete in-memory backend: both account relations plus the catalog
#[derive(Clone)]
pub struct MemoryBackend {
    pub buyers: Arc<MemoryAccountStore>,
    pub sellers: Arc<MemoryAccountStore>,
    pub store: Arc<MemoryStore>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            buyers: Arc::new(MemoryAccountStore::with_carts(Role::Buyer, store.clone())),
            sellers: Arc::new(MemoryAccountStore::new(Role::Seller)),
            store,
        }
    }

    pub fn directory(&self) -> AccountDirectory {
        AccountDirectory::new(self.buyers.clone(), self.sellers.clone())
    }

    pub fn accounts(&self, role: Role) -> &Arc<MemoryAccountStore> {
        match role {
            Role::Buyer => &self.buyers,
            Role::Seller => &self.sellers,
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account(username: &str, email: &str, phone: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: format!("hash-{username}"),
            first_name: "First".to_string(),
            last_name: "Last".to_string(),
            phone: phone.to_string(),
            address: "1 Market Street".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_stamps_active_and_assigns_ids() {
        let store = MemoryAccountStore::new(Role::Buyer);
        let a = store.create(&new_account("a", "a@x.io", "1")).await.unwrap();
        let b = store.create(&new_account("b", "b@x.io", "2")).await.unwrap();

        assert!(a.is_active);
        assert_ne!(a.id, b.id);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unique_fields_within_relation() {
        let store = MemoryAccountStore::new(Role::Seller);
        store.create(&new_account("a", "a@x.io", "1")).await.unwrap();

        let dup_email = store.create(&new_account("b", "a@x.io", "2")).await;
        assert!(matches!(dup_email, Err(ArenaError::Conflict(_))));

        let dup_phone = store.create(&new_account("c", "c@x.io", "1")).await;
        assert!(matches!(dup_phone, Err(ArenaError::Conflict(_))));

        let dup_username = store.create(&new_account("a", "d@x.io", "3")).await;
        assert!(matches!(dup_username, Err(ArenaError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_same_identity_allowed_across_relations() {
        let backend = MemoryBackend::new();
        backend
            .buyers
            .create(&new_account("a", "a@x.io", "1"))
            .await
            .unwrap();
        backend
            .sellers
            .create(&new_account("a", "a@x.io", "1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_credential_updates_skip_inactive_rows() {
        let store = MemoryAccountStore::new(Role::Buyer);
        store.create(&new_account("a", "a@x.io", "1")).await.unwrap();
        store.set_active("a@x.io", false).await;

        assert!(store
            .update_password_by_hash("hash-a", "new")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .update_password_by_email("a@x.io", "new")
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.snapshot().await[0].password_hash, "hash-a");
    }

    #[tokio::test]
    async fn test_blacklist_membership() {
        let store = MemoryStore::new();
        assert!(!store.contains("t1").await.unwrap());
        assert!(store.insert("t1").await.unwrap());
        assert!(!store.insert("t1").await.unwrap());
        assert!(store.contains("t1").await.unwrap());
        assert!(!store.contains("t2").await.unwrap());
    }

    #[tokio::test]
    async fn test_lookups_by_username_and_phone() {
        let store = MemoryAccountStore::new(Role::Seller);
        let a = store.create(&new_account("a", "a@x.io", "0801")).await.unwrap();
        store.create(&new_account("b", "b@x.io", "0802")).await.unwrap();

        let by_username = store.find_by_username("a").await.unwrap().unwrap();
        assert_eq!(by_username.id, a.id);
        let by_phone = store.find_by_phone("0801").await.unwrap().unwrap();
        assert_eq!(by_phone.id, a.id);

        assert!(store.find_by_username("A").await.unwrap().is_none());
        assert!(store.find_by_phone("0803").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_buyer_and_cart_created_together() {
        let backend = MemoryBackend::new();
        let (buyer, cart) = backend
            .buyers
            .create_with_cart(&new_account("a", "a@x.io", "1"))
            .await
            .unwrap();

        assert_eq!(cart.buyer_id, buyer.id);
        assert_eq!(backend.store.carts().await.len(), 1);
        assert!(matches!(
            backend.sellers.create_with_cart(&new_account("s", "s@x.io", "2")).await,
            Err(ArenaError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_cart_leaves_no_buyer() {
        let backend = MemoryBackend::new();
        backend.store.fail_cart_creation(true);

        let result = backend
            .buyers
            .create_with_cart(&new_account("a", "a@x.io", "1"))
            .await;
        assert!(matches!(result, Err(ArenaError::StoreFailure(_))));
        assert!(backend.buyers.snapshot().await.is_empty());

        // Nothing was left behind to conflict with
        backend.store.fail_cart_creation(false);
        backend
            .buyers
            .create_with_cart(&new_account("a", "a@x.io", "1"))
            .await
            .unwrap();
        assert_eq!(backend.store.carts().await.len(), 1);
    }
}
